//! Gatecast CLI - Drive the playback orchestrator against the simulation
//!
//! Every subcommand starts one playback session on simulated collaborators,
//! prints the events and tech state it produces, then disposes the player.

mod commands;

use std::path::PathBuf;

use clap::Parser;
use gatecast_core::tracing_setup::{CliLogLevel, init_tracing};

#[derive(Parser)]
#[command(name = "gatecast")]
#[command(about = "Entitlement-gated playback orchestration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: commands::Commands,

    /// Console log level
    #[arg(long, global = true, default_value = "info")]
    log_level: CliLogLevel,

    /// Seconds to watch the session before disposing the player
    #[arg(long, global = true, default_value = "10")]
    watch_secs: u64,

    /// Directory for the full-trace run log
    #[arg(long, global = true)]
    logs_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(log_file) = init_tracing(cli.log_level.into(), cli.logs_dir.as_deref())? {
        println!("Run log: {}", log_file.display());
    }

    commands::handle_command(cli.command, cli.watch_secs).await
}
