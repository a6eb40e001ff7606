//! Sluice Worker
//!
//! Submits image-processing steps to a batch scheduler, follows the jobs to
//! completion and reports their lifecycle to a remote control plane.
//!
//! Architecture:
//! - Configuration: Load settings from environment or defaults
//! - Store: Crash-safe snapshots of active jobs and dispatched inputs
//! - Batch: Scheduler client (job submission and status queries)
//! - Repository: HTTP communication with the control plane
//! - Services: Notifier, archival, orchestrator facade
//! - Lifecycle: Job monitor, recovery verifier, completion handling, heartbeat
//! - Watcher: Turns newly uploaded volumes into pipelines
//! - API: Local HTTP surface used by the control plane and operators

mod api;
mod batch;
mod config;
mod error;
mod lifecycle;
mod repository;
mod service;
mod shutdown;
mod store;
mod watcher;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::batch::{Scheduler, SlurmScheduler};
use crate::config::Config;
use crate::lifecycle::{CompletionHandler, JobMonitor, RecoveryVerifier, run_heartbeat};
use crate::repository::{ControlPlaneRepository, HttpControlPlaneRepository};
use crate::service::{Archiver, FsArchiver, Notifier, Orchestrator};
use crate::store::{JobStore, ProcessedLedger};
use crate::watcher::{ArrivalWatcher, WatcherHandle};
use sluice_client::ControlPlaneClient;

#[derive(Parser, Debug)]
#[command(name = "sluice-worker")]
#[command(about = "Batch scheduler worker for image-processing pipelines", long_about = None)]
struct Args {
    /// Address the local API binds to
    #[arg(long, env = "WORKER_HOST", default_value = "0.0.0.0")]
    host: String,

    /// Port the local API listens on
    #[arg(long, env = "WORKER_PORT", default_value_t = 7000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sluice_worker=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting Sluice Worker");

    // Load configuration
    let config = load_config()?;
    info!(
        "Loaded configuration: worker_id={}, control_plane_url={}",
        config.worker_id, config.control_plane_url
    );

    let shutdown = shutdown::install_shutdown_handler()?;

    // Initialize control-plane client
    let client = ControlPlaneClient::with_timeout(&config.control_plane_url, config.http_timeout)
        .context("Failed to build control-plane client")?;
    let repo: Arc<dyn ControlPlaneRepository> =
        Arc::new(HttpControlPlaneRepository::new(client.clone()));

    // Load persisted state
    let store = JobStore::load(&config.job_store_path);
    let restored = store.len();
    let store = Arc::new(Mutex::new(store));
    let ledger = Arc::new(Mutex::new(ProcessedLedger::load(
        &config.ledger_path,
        config.ledger_retention,
    )));

    // Initialize services
    let notifier = Arc::new(Notifier::new(repo, shutdown.clone(), &config));
    let scheduler: Arc<dyn Scheduler> = Arc::new(SlurmScheduler::new(&config));
    let archiver: Arc<dyn Archiver> = Arc::new(FsArchiver::new(&config));
    let completion = Arc::new(CompletionHandler::new(
        scheduler.clone(),
        archiver,
        notifier.clone(),
        config.watch_dir.clone(),
    ));
    let monitor = Arc::new(JobMonitor::new(
        scheduler.clone(),
        store.clone(),
        notifier.clone(),
        completion,
        config.job_check_interval,
        shutdown.clone(),
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        config.worker_id.clone(),
        scheduler,
        store.clone(),
        notifier.clone(),
        shutdown.clone(),
    ));
    let watcher_handle = WatcherHandle::default();

    info!("Services initialized");

    let mut tasks = Vec::new();

    tasks.push(tokio::spawn(run_heartbeat(
        notifier.clone(),
        store.clone(),
        config.heartbeat_interval,
        shutdown.clone(),
    )));

    // Restored jobs are verified before the regular monitor loop starts
    let recovery = (restored > 0).then(|| {
        RecoveryVerifier::new(
            monitor.clone(),
            store.clone(),
            config.recovery_delay,
            shutdown.clone(),
        )
    });
    tasks.push(tokio::spawn(async move {
        if let Some(recovery) = recovery {
            recovery.run().await;
        }
        monitor.run().await;
    }));

    if config.watch_dir.is_dir() {
        let watcher = ArrivalWatcher::new(
            &config,
            ledger.clone(),
            notifier.clone(),
            watcher_handle.clone(),
            shutdown.clone(),
        );
        tasks.push(tokio::spawn(async move { watcher.run().await }));
    } else {
        warn!(
            "Watch directory {} does not exist, arrival watcher not started",
            config.watch_dir.display()
        );
    }

    // Build router
    let app = api::create_router(AppState {
        worker_id: config.worker_id.clone(),
        orchestrator,
        ledger,
        watcher: watcher_handle,
        watch_dir: config.watch_dir.clone(),
    });

    let addr = format!("{}:{}", args.host, args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Listening on {}", addr);

    let server_shutdown = shutdown.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await
        .context("Server error")?;

    // Ensure background loops stop even if the server exited on its own
    shutdown.cancel();

    info!("Shutting down, closing control-plane transport");
    client.close();

    for task in tasks {
        if let Err(e) = task.await {
            warn!("Background task panicked: {}", e);
        }
    }

    info!("Sluice Worker stopped");
    Ok(())
}

/// Loads configuration from environment variables with fallback to defaults
fn load_config() -> Result<Config> {
    match Config::from_env() {
        Ok(config) => {
            config.validate()?;
            Ok(config)
        }
        Err(e) => {
            info!("Failed to load config from environment ({}), using defaults", e);
            let config = Config::default();
            config.validate()?;
            Ok(config)
        }
    }
}
