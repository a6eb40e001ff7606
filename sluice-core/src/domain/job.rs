//! Job record domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::status::SchedulerStatus;

/// Identity of an active job: one per (pipeline, step) pair
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct JobKey {
    pub pipeline_id: String,
    pub step_name: String,
}

impl JobKey {
    pub fn new(pipeline_id: impl Into<String>, step_name: impl Into<String>) -> Self {
        Self {
            pipeline_id: pipeline_id.into(),
            step_name: step_name.into(),
        }
    }
}

impl std::fmt::Display for JobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.pipeline_id, self.step_name)
    }
}

/// Local tracking entry for one in-flight scheduler submission
///
/// Created when the scheduler accepts a submission, updated by the job
/// monitor, and dropped once the scheduler reports a terminal state and
/// completion handling has run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: String,
    pub pipeline_id: String,
    pub step_name: String,
    pub submit_time: DateTime<Utc>,
    pub last_check_time: DateTime<Utc>,
    #[serde(default, alias = "h5_image_name")]
    pub input_file_name: Option<String>,
    pub status: SchedulerStatus,
}

impl JobRecord {
    /// A freshly submitted job, initially `PENDING`
    pub fn submitted(
        key: &JobKey,
        job_id: impl Into<String>,
        input_file_name: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            job_id: job_id.into(),
            pipeline_id: key.pipeline_id.clone(),
            step_name: key.step_name.clone(),
            submit_time: now,
            last_check_time: now,
            input_file_name,
            status: SchedulerStatus::Pending,
        }
    }

    pub fn key(&self) -> JobKey {
        JobKey::new(self.pipeline_id.clone(), self.step_name.clone())
    }

    /// Input name, or the empty string when the job had none
    pub fn input_name(&self) -> &str {
        self.input_file_name.as_deref().unwrap_or("")
    }
}
