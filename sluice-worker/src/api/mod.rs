//! API Module
//!
//! Local HTTP surface of the worker, called by the control plane to start
//! steps and by operators to inspect the worker.

pub mod error;
pub mod health;
pub mod worker;

use axum::{
    Router,
    routing::{get, post},
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;

use crate::service::Orchestrator;
use crate::store::ProcessedLedger;
use crate::watcher::WatcherHandle;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub worker_id: String,
    pub orchestrator: Arc<Orchestrator>,
    pub ledger: Arc<Mutex<ProcessedLedger>>,
    pub watcher: WatcherHandle,
    pub watch_dir: PathBuf,
}

/// Create the worker API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/worker/start", post(worker::start_step))
        .route("/api/worker/status", get(worker::worker_status))
        .route(
            "/api/worker/file-watcher/status",
            get(worker::watcher_status),
        )
        .route("/api/worker/health", get(health::health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
