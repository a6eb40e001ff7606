//! Step command handlers

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use sluice_client::WorkerClient;
use sluice_core::dto::worker::{StartStatus, StartStepRequest};

use crate::config::Config;

/// Step subcommands
#[derive(Subcommand)]
pub enum StepCommands {
    /// Ask the worker to submit a step
    Start {
        /// Pipeline ID
        pipeline_id: String,

        /// Step name (e.g., mip_generation, bit_conversion)
        step_name: String,

        /// Input volume name (e.g., sample.pyramid.h5)
        #[arg(long)]
        image: Option<String>,
    },
}

/// Handle step commands
pub async fn handle_step_command(command: StepCommands, config: &Config) -> Result<()> {
    let client = WorkerClient::new(&config.worker_url);

    match command {
        StepCommands::Start {
            pipeline_id,
            step_name,
            image,
        } => start_step(&client, pipeline_id, step_name, image).await,
    }
}

async fn start_step(
    client: &WorkerClient,
    pipeline_id: String,
    step_name: String,
    image: Option<String>,
) -> Result<()> {
    let request = StartStepRequest {
        pipeline_id,
        step_name,
        h5_image_name: image,
    };

    let response = client.start_step(&request).await?;

    let status = match response.status {
        StartStatus::Submitted => "submitted".green(),
        StartStatus::AlreadyRunning => "already running".yellow(),
    };

    println!("{} {}", "✓".green(), response.message);
    println!("  Pipeline: {}", response.pipeline_id.bold());
    println!("  Job ID:   {}", response.job_id.bold());
    println!("  Status:   {}", status);

    Ok(())
}
