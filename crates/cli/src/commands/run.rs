//! The `run` subcommand: pilot the vehicle from stdin

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use opencockpit_calibration::{CalibrationPatch, VehicleStatePatch};
use opencockpit_link::{ControlLink, LinkConfig};
use opencockpit_settings::FileSettings;
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use uuid::Uuid;

use crate::commands::resolve_data_dir;

/// Group identifier used when neither flag nor environment provides one.
const DEFAULT_GROUP_ID: &str = "14ed4af8-5256-4e74-a5d6-545dfc0b004c";

#[derive(Args)]
pub struct RunArgs {
    /// WebSocket endpoint of the relay server
    #[arg(long, env = "COCKPIT_ENDPOINT", default_value = "ws://192.168.0.80:9000")]
    pub endpoint: String,

    /// Camera stream URL, passed through to consumers untouched
    #[arg(long, env = "COCKPIT_CAMERA_URL")]
    pub camera_url: Option<String>,

    /// Static group identifier shared with the vehicle
    #[arg(long, env = "COCKPIT_GROUP_ID", default_value = DEFAULT_GROUP_ID)]
    pub group_id: Uuid,

    /// Data directory for persisted console settings
    #[arg(long, env = "COCKPIT_DATA_DIR")]
    pub data_dir: Option<PathBuf>,
}

/// One line of console input: either a partial state update or a
/// partial calibration update.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum ConsoleCommand {
    State(VehicleStatePatch),
    Calibration(CalibrationPatch),
}

pub async fn run(args: RunArgs) -> Result<()> {
    let data_dir = resolve_data_dir(args.data_dir);
    let settings = Arc::new(
        FileSettings::open(&data_dir)
            .await
            .with_context(|| format!("Failed to open settings under {data_dir:?}"))?,
    );

    let mut config = LinkConfig::new(args.endpoint, args.group_id);
    if let Some(url) = args.camera_url {
        config = config.with_camera_stream_url(url);
    }

    let mut link = ControlLink::new(config, settings);
    link.initialize().await?;

    if let Some(url) = link.camera_stream_url() {
        info!("Camera stream at {url}");
    }

    let status_task = tokio::spawn(watch_status(link.subscribe()));

    let stdin = BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
            line = lines.next_line() => match line.context("Failed to read console input")? {
                Some(line) => handle_line(&link, line.trim()).await?,
                None => {
                    info!("Input closed, shutting down");
                    break;
                }
            },
        }
    }

    status_task.abort();
    link.teardown().await;
    Ok(())
}

async fn handle_line(link: &ControlLink, line: &str) -> Result<()> {
    if line.is_empty() {
        return Ok(());
    }

    match serde_json::from_str::<ConsoleCommand>(line) {
        Ok(ConsoleCommand::State(patch)) => link.update_state(patch).await,
        Ok(ConsoleCommand::Calibration(patch)) => link.update_calibration(patch).await,
        Err(err) => {
            warn!("Ignoring invalid console command: {err}");
            Ok(())
        }
    }
}

async fn watch_status(mut status: tokio::sync::watch::Receiver<opencockpit_link::LinkStatus>) {
    let mut last = *status.borrow();
    while status.changed().await.is_ok() {
        let current = *status.borrow_and_update();
        if current.phase != last.phase {
            info!(phase = ?current.phase, "Link phase changed");
        }
        if current.latency != last.latency {
            if let Some(latency) = current.latency {
                info!(latency_ms = latency.num_milliseconds(), "Latency");
            }
        }
        last = current;
    }
}
