//! Sluice CLI
//!
//! Command-line interface for a sluice worker's local API.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::Config;

#[derive(Parser)]
#[command(name = "sluice")]
#[command(about = "Sluice worker CLI", long_about = None)]
struct Cli {
    /// Worker URL
    #[arg(long, env = "SLUICE_WORKER_URL", default_value = "http://localhost:7000")]
    worker_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config {
        worker_url: cli.worker_url,
    };

    handle_command(cli.command, &config).await
}
