//! Control-plane DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::status::StepStatus;

/// Request to create a pipeline for a newly arrived input file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePipeline {
    pub h5_img_name: String,
    pub uploader: String,
    pub notification_emails: Vec<String>,
    pub wait_for_image_upload: bool,
}

/// Control-plane answer to `CreatePipeline`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineCreated {
    pub pipeline_id: String,
}

/// Step status/progress update
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepUpdate {
    pub status: StepStatus,
    pub progress: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Step completion report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepComplete {
    pub job_id: String,
    pub completion_time: DateTime<Utc>,
}

/// Step failure report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFail {
    pub error_message: String,
    pub failure_time: DateTime<Utc>,
}

/// Periodic liveness report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub worker_id: String,
    pub timestamp: DateTime<Utc>,
    pub running_jobs: usize,
    pub status: String,
}
