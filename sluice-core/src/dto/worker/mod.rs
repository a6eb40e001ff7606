//! Local worker API DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::job::JobRecord;

/// Request to start a processing step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartStepRequest {
    pub pipeline_id: String,
    pub step_name: String,
    #[serde(default)]
    pub h5_image_name: Option<String>,
}

/// How a start request was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartStatus {
    Submitted,
    AlreadyRunning,
}

/// Successful answer to `StartStepRequest`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartStepResponse {
    pub message: String,
    pub pipeline_id: String,
    pub status: StartStatus,
    pub job_id: String,
}

/// Snapshot of the worker and its active jobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub worker_id: String,
    pub is_running: bool,
    pub running_jobs_count: usize,
    pub running_jobs: Vec<JobRecord>,
    pub timestamp: DateTime<Utc>,
}

/// Arrival watcher state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatcherState {
    Running,
    Stopped,
    NotRunning,
}

/// Arrival watcher status report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatcherStatus {
    pub status: WatcherState,
    pub watch_path: String,
    pub is_alive: bool,
    pub processed_files: usize,
    pub last_poll: Option<DateTime<Utc>>,
    pub timestamp: DateTime<Utc>,
}

/// Health probe answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Health {
    pub status: String,
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,
}
