//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod step;
mod worker;

pub use step::StepCommands;

use anyhow::Result;
use clap::Subcommand;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Step submission
    Step {
        #[command(subcommand)]
        command: StepCommands,
    },
    /// Show worker status and active jobs
    Status,
    /// Show arrival watcher status
    Watcher,
    /// Check worker health
    Health,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Step { command } => step::handle_step_command(command, config).await,
        Commands::Status => worker::show_status(config).await,
        Commands::Watcher => worker::show_watcher(config).await,
        Commands::Health => worker::show_health(config).await,
    }
}
