//! API Error Handling

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::WorkerError;

/// API error type
#[derive(Debug)]
pub enum ApiError {
    /// The worker is shutting down and accepts no new work
    Unavailable(String),
    SubmissionFailed(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::SubmissionFailed(msg) => {
                tracing::error!("Submission failed: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

impl From<WorkerError> for ApiError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::ShuttingDown => ApiError::Unavailable(err.to_string()),
            other => ApiError::SubmissionFailed(other.to_string()),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
