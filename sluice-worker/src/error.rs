//! Worker error taxonomy
//!
//! Scheduler status-query failures never appear here: they are folded into
//! the `TIMEOUT`/`ERROR` statuses at the scheduler boundary. Persistence
//! failures are logged where they happen (see `store::PersistenceError`).

use sluice_client::ClientError;
use sluice_core::UnknownStepError;
use thiserror::Error;

use crate::batch::SchedulerError;

pub type Result<T> = std::result::Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    /// The scheduler rejected the submission or its acknowledgment was unusable
    #[error("submission failed: {0}")]
    Submission(String),

    #[error(transparent)]
    UnknownStep(#[from] UnknownStepError),

    /// The job reported success but its expected output is absent
    #[error("job ended but no output artifact found: {expected}")]
    ArtifactMissing { job_id: String, expected: String },

    /// A control-plane call failed
    #[error("control-plane call failed: {0}")]
    Notification(#[from] ClientError),

    /// The process is shutting down and no longer accepts work
    #[error("worker is shutting down")]
    ShuttingDown,
}

impl From<SchedulerError> for WorkerError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::UnknownStep(e) => WorkerError::UnknownStep(e),
            other => WorkerError::Submission(other.to_string()),
        }
    }
}
