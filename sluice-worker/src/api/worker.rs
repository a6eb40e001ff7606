//! Worker API Handlers
//!
//! Step submission and status endpoints.

use axum::{Json, extract::State};
use chrono::Utc;
use sluice_core::dto::worker::{
    StartStatus, StartStepRequest, StartStepResponse, WatcherStatus, WorkerStatus,
};

use crate::api::AppState;
use crate::api::error::ApiResult;
use crate::service::StartOutcome;

/// POST /api/worker/start
/// Submit a step for a pipeline, or report the job already running for it
pub async fn start_step(
    State(state): State<AppState>,
    Json(req): Json<StartStepRequest>,
) -> ApiResult<Json<StartStepResponse>> {
    tracing::info!(
        "Start requested for {}/{} (input: {:?})",
        req.pipeline_id,
        req.step_name,
        req.h5_image_name
    );

    let outcome = state
        .orchestrator
        .start_step(
            &req.pipeline_id,
            &req.step_name,
            req.h5_image_name.as_deref(),
        )
        .await?;

    let (status, message) = match &outcome {
        StartOutcome::Submitted { .. } => (
            StartStatus::Submitted,
            format!("Step {} submitted", req.step_name),
        ),
        StartOutcome::AlreadyRunning { .. } => (
            StartStatus::AlreadyRunning,
            format!("Step {} is already running", req.step_name),
        ),
    };

    Ok(Json(StartStepResponse {
        message,
        pipeline_id: req.pipeline_id,
        status,
        job_id: outcome.job_id().to_string(),
    }))
}

/// GET /api/worker/status
pub async fn worker_status(State(state): State<AppState>) -> Json<WorkerStatus> {
    Json(state.orchestrator.status().await)
}

/// GET /api/worker/file-watcher/status
pub async fn watcher_status(State(state): State<AppState>) -> Json<WatcherStatus> {
    let processed_files = state.ledger.lock().await.len();

    Json(WatcherStatus {
        status: state.watcher.state(),
        watch_path: state.watch_dir.display().to_string(),
        is_alive: state.watcher.is_alive(),
        processed_files,
        last_poll: state.watcher.last_poll(),
        timestamp: Utc::now(),
    })
}
