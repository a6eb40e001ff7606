//! Scheduler client
//!
//! Submits step jobs to the external batch scheduler and queries their state.
//! The scheduler speaks a text protocol over its command-line tools; all
//! parsing happens here and callers only ever see `SchedulerStatus` values.

mod parse;
mod script;
mod slurm;

use async_trait::async_trait;
use sluice_core::{SchedulerStatus, UnknownStepError};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub use slurm::SlurmScheduler;

/// Why a submission did not produce a job id
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    UnknownStep(#[from] UnknownStepError),

    #[error("stage script not found: {}", .0.display())]
    MissingScript(PathBuf),

    #[error("failed to write job description: {0}")]
    JobDescription(#[source] std::io::Error),

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("scheduler rejected submission: {0}")]
    Rejected(String),

    #[error("unrecognized submission acknowledgment: {0:?}")]
    UnparseableAck(String),

    #[error("{command} timed out after {}s", .after.as_secs())]
    Timeout { command: String, after: Duration },
}

/// Batch scheduler operations used by the worker
#[async_trait]
pub trait Scheduler: Send + Sync {
    /// Submits `step_name` for `pipeline_id`
    ///
    /// `input_file_name` is the triggering input as named by the control
    /// plane (empty when there is none); the step's own name mapping is
    /// applied before it reaches the job.
    ///
    /// # Returns
    /// The scheduler-assigned job id
    async fn submit(
        &self,
        pipeline_id: &str,
        step_name: &str,
        input_file_name: &str,
    ) -> Result<String, SchedulerError>;

    /// Current state of a job
    ///
    /// Never fails: a query that exceeds its bound is `Timeout`, one that
    /// cannot run is `Error`, and a job neither tool knows is `Unknown`.
    async fn query_status(&self, job_id: &str) -> SchedulerStatus;

    /// Best-effort description of why a job ended badly
    async fn error_detail(&self, job_id: &str) -> Option<String>;
}
