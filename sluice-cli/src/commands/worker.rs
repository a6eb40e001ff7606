//! Worker status command handlers

use anyhow::Result;
use chrono::{DateTime, Utc};
use colored::*;
use sluice_client::WorkerClient;
use sluice_core::dto::worker::WatcherState;
use sluice_core::{JobRecord, SchedulerStatus};

use crate::config::Config;

/// Show worker status and its active jobs
pub async fn show_status(config: &Config) -> Result<()> {
    let client = WorkerClient::new(&config.worker_url);
    let status = client.status().await?;

    let running = if status.is_running {
        "running".green()
    } else {
        "shutting down".yellow()
    };
    println!("Worker {} ({})", status.worker_id.bold(), running);
    println!();

    if status.running_jobs.is_empty() {
        println!("{}", "No active jobs.".yellow());
    } else {
        println!(
            "{}",
            format!("{} active job(s):", status.running_jobs_count).bold()
        );
        println!();
        for job in &status.running_jobs {
            print_job_summary(job);
        }
    }

    Ok(())
}

/// Show arrival watcher status
pub async fn show_watcher(config: &Config) -> Result<()> {
    let client = WorkerClient::new(&config.worker_url);
    let status = client.watcher_status().await?;

    let state = match status.status {
        WatcherState::Running => "running".green(),
        WatcherState::Stopped => "stopped".red(),
        WatcherState::NotRunning => "not running".yellow(),
    };

    println!("Arrival watcher: {}", state);
    println!("  Path:      {}", status.watch_path);
    println!("  Processed: {}", status.processed_files);
    println!(
        "  Last poll: {}",
        status
            .last_poll
            .map(format_time)
            .unwrap_or_else(|| "never".to_string())
            .dimmed()
    );

    Ok(())
}

/// Check worker health
pub async fn show_health(config: &Config) -> Result<()> {
    let client = WorkerClient::new(&config.worker_url);
    let health = client.health().await?;

    println!(
        "{} Worker {} is {}",
        "✓".green(),
        health.worker_id.bold(),
        health.status.green()
    );

    Ok(())
}

fn print_job_summary(job: &JobRecord) {
    println!(
        "  {} {}/{}",
        "▸".cyan(),
        job.pipeline_id.bold(),
        job.step_name
    );
    println!("    Job ID:     {}", job.job_id);
    println!("    Status:     {}", colorize_status(job.status));
    if let Some(input) = &job.input_file_name {
        println!("    Input:      {}", input);
    }
    println!("    Submitted:  {}", format_time(job.submit_time).dimmed());
    println!("    Checked:    {}", format_time(job.last_check_time).dimmed());
    println!();
}

fn format_time(time: DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Colorize scheduler status for display
fn colorize_status(status: SchedulerStatus) -> ColoredString {
    match status {
        SchedulerStatus::Pending => status.as_str().yellow(),
        SchedulerStatus::Running => status.as_str().cyan(),
        SchedulerStatus::Completed => status.as_str().green(),
        _ => status.as_str().red(),
    }
}
