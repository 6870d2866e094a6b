//! cockpitctl - OpenCockpit pilot console CLI
//!
//! A headless front end for the vehicle control link: connects to the
//! relay, logs lifecycle and latency, and accepts control input as
//! newline-delimited JSON on stdin.

#![deny(unused_must_use)]
#![deny(clippy::unwrap_used)]

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::{RunArgs, SettingsCommands};

#[derive(Parser)]
#[command(name = "cockpitctl")]
#[command(about = "OpenCockpit pilot console - fly a remote vehicle from the terminal")]
#[command(version)]
#[command(long_about = "
cockpitctl drives the OpenCockpit vehicle control link without the browser
dashboard. `run` connects to the relay and pilots the vehicle from stdin;
`settings` inspects or wipes the persisted console settings.

Control input is one JSON object per line, e.g.
  {\"state\": {\"throttle\": 0.5}}
  {\"calibration\": {\"rudder\": {\"trim\": 0.05, \"reverse\": true}}}
")]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the relay and pilot the vehicle from stdin
    Run(RunArgs),

    /// Persisted console settings
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Run(args) => commands::run(args).await,
        Commands::Settings(command) => commands::settings(command).await,
    }
}
