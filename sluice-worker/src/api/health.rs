//! Health Check API Handler

use axum::{Json, extract::State};
use chrono::Utc;
use sluice_core::dto::worker::Health;

use crate::api::AppState;

/// GET /api/worker/health
pub async fn health_check(State(state): State<AppState>) -> Json<Health> {
    Json(Health {
        status: "healthy".to_string(),
        worker_id: state.worker_id,
        timestamp: Utc::now(),
    })
}
