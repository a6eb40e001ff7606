//! Orchestrator facade
//!
//! Entry point for step submissions requested by the control plane. Keeps
//! at most one active job per (pipeline, step): a second request for a key
//! that is still active returns the existing job id without submitting.

use chrono::Utc;
use sluice_core::dto::worker::WorkerStatus;
use sluice_core::{JobKey, JobRecord};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::batch::Scheduler;
use crate::error::{Result, WorkerError};
use crate::service::Notifier;
use crate::store::JobStore;

/// Result of a start request that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartOutcome {
    Submitted { job_id: String },
    AlreadyRunning { job_id: String },
}

impl StartOutcome {
    pub fn job_id(&self) -> &str {
        match self {
            StartOutcome::Submitted { job_id } | StartOutcome::AlreadyRunning { job_id } => job_id,
        }
    }
}

pub struct Orchestrator {
    worker_id: String,
    scheduler: Arc<dyn Scheduler>,
    store: Arc<Mutex<JobStore>>,
    notifier: Arc<Notifier>,
    shutdown: CancellationToken,

    /// Serializes the check-submit-record sequence
    submit_lock: Mutex<()>,
}

impl Orchestrator {
    pub fn new(
        worker_id: String,
        scheduler: Arc<dyn Scheduler>,
        store: Arc<Mutex<JobStore>>,
        notifier: Arc<Notifier>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            worker_id,
            scheduler,
            store,
            notifier,
            shutdown,
            submit_lock: Mutex::new(()),
        }
    }

    /// Submits a step unless one is already active for the same key
    ///
    /// Submission failures are reported to the control plane before they are
    /// returned. Malformed identifiers are rejected without reporting, since
    /// they cannot name a remote step.
    pub async fn start_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        input_file_name: Option<&str>,
    ) -> Result<StartOutcome> {
        if self.shutdown.is_cancelled() {
            return Err(WorkerError::ShuttingDown);
        }

        check_identifier("pipeline id", pipeline_id)?;
        if let Some(name) = input_file_name {
            check_file_name(name)?;
        }

        let _guard = self.submit_lock.lock().await;
        let key = JobKey::new(pipeline_id, step_name);

        if let Some(existing) = self.store.lock().await.get(&key) {
            info!(
                "Step {} already running as job {}",
                key, existing.job_id
            );
            return Ok(StartOutcome::AlreadyRunning {
                job_id: existing.job_id.clone(),
            });
        }

        let submitted = self
            .scheduler
            .submit(pipeline_id, step_name, input_file_name.unwrap_or(""))
            .await;

        let job_id = match submitted {
            Ok(job_id) => job_id,
            Err(e) => {
                let err = WorkerError::from(e);
                self.notifier
                    .notify_failed(
                        pipeline_id,
                        step_name,
                        &format!("Failed to submit {}: {}", step_name, err),
                    )
                    .await;
                return Err(err);
            }
        };

        let record = JobRecord::submitted(&key, &job_id, input_file_name.map(String::from));
        {
            let mut store = self.store.lock().await;
            store.insert(record.clone());
            store.save_or_log();
        }

        self.notifier.notify_started(&record).await;

        Ok(StartOutcome::Submitted { job_id })
    }

    pub async fn status(&self) -> WorkerStatus {
        let running_jobs = self.store.lock().await.snapshot();

        WorkerStatus {
            worker_id: self.worker_id.clone(),
            is_running: !self.shutdown.is_cancelled(),
            running_jobs_count: running_jobs.len(),
            running_jobs,
            timestamp: Utc::now(),
        }
    }
}

/// Pipeline ids end up in URLs, job names and file names
fn check_identifier(what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(WorkerError::Submission(format!("{} is empty", what)));
    }
    if value
        .chars()
        .any(|c| c.is_control() || c.is_whitespace() || c == '/')
    {
        return Err(WorkerError::Submission(format!(
            "{} {:?} contains whitespace, control characters or '/'",
            what, value
        )));
    }
    Ok(())
}

/// Input names are resolved inside the watched directory
fn check_file_name(value: &str) -> Result<()> {
    if value.chars().any(|c| c.is_control() || c == '/') || value == ".." {
        return Err(WorkerError::Submission(format!(
            "input name {:?} is not a plain file name",
            value
        )));
    }
    Ok(())
}
