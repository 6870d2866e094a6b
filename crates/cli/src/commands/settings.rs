//! The `settings` subcommand: inspect or wipe the persisted store

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use opencockpit_settings::{FileSettings, SettingsDocument, SettingsStore};
use tracing::info;

use crate::commands::resolve_data_dir;

#[derive(Subcommand)]
pub enum SettingsCommands {
    /// Print the persisted settings as JSON
    Show {
        /// Data directory for persisted console settings
        #[arg(long, env = "COCKPIT_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Remove every persisted key
    Clear {
        /// Data directory for persisted console settings
        #[arg(long, env = "COCKPIT_DATA_DIR")]
        data_dir: Option<PathBuf>,
    },
}

pub async fn settings(command: SettingsCommands) -> Result<()> {
    match command {
        SettingsCommands::Show { data_dir } => {
            let store = open(data_dir).await?;
            let document = SettingsDocument {
                vehicle_id: store.vehicle_id().await?,
                vehicle_state: store.vehicle_state().await?,
                calibration: store.calibration().await?,
                flip_camera_stream: store.flip_camera_stream().await?,
            };
            println!("{}", serde_json::to_string_pretty(&document)?);
            Ok(())
        }
        SettingsCommands::Clear { data_dir } => {
            let store = open(data_dir).await?;
            store.clear().await?;
            info!("Settings cleared");
            Ok(())
        }
    }
}

async fn open(data_dir: Option<PathBuf>) -> Result<FileSettings> {
    let data_dir = resolve_data_dir(data_dir);
    FileSettings::open(&data_dir)
        .await
        .with_context(|| format!("Failed to open settings under {data_dir:?}"))
}
