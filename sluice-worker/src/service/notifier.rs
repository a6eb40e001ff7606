//! Notifier
//!
//! Reports job lifecycle events and heartbeats to the control plane.
//!
//! Every call is fire-and-forget from the caller's point of view: failures
//! are logged, never retried here, and never propagated. Once shutdown has
//! begun or the transport is closed, calls are skipped outright, and results
//! of calls that were in flight when shutdown began are discarded.

use chrono::Utc;
use sluice_core::dto::pipeline::{CreatePipeline, Heartbeat, StepComplete, StepFail, StepUpdate};
use sluice_core::{JobRecord, SchedulerStatus, StepStatus};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::{Result, WorkerError};
use crate::repository::ControlPlaneRepository;

pub struct Notifier {
    repo: Arc<dyn ControlPlaneRepository>,
    shutdown: CancellationToken,
    worker_id: String,
    uploader: String,
    notification_emails: Vec<String>,
}

impl Notifier {
    pub fn new(
        repo: Arc<dyn ControlPlaneRepository>,
        shutdown: CancellationToken,
        config: &Config,
    ) -> Self {
        Self {
            repo,
            shutdown,
            worker_id: config.worker_id.clone(),
            uploader: config.uploader.clone(),
            notification_emails: config.notification_emails.clone(),
        }
    }

    fn suspended(&self) -> bool {
        self.shutdown.is_cancelled() || self.repo.is_closed()
    }

    /// Runs one control-plane call under the skip/discard rules
    async fn deliver<F>(&self, action: &str, call: F)
    where
        F: Future<Output = sluice_client::Result<()>>,
    {
        if self.suspended() {
            debug!("Skipping {}: worker is shutting down", action);
            return;
        }

        let result = call.await;

        if self.shutdown.is_cancelled() {
            debug!("Discarding result of {}: worker is shutting down", action);
            return;
        }

        if let Err(e) = result {
            warn!("Failed to {}: {}", action, e);
        }
    }

    /// Reports a freshly submitted job
    pub async fn notify_started(&self, record: &JobRecord) {
        let update = StepUpdate {
            status: StepStatus::Running,
            progress: 0,
            job_id: Some(record.job_id.clone()),
            start_time: Some(record.submit_time),
            error_message: None,
        };

        self.deliver(
            &format!("report start of {}/{}", record.pipeline_id, record.step_name),
            self.repo
                .update_step(&record.pipeline_id, &record.step_name, &update),
        )
        .await;
    }

    /// Reports a status change observed by the monitor
    pub async fn notify_progress(
        &self,
        record: &JobRecord,
        status: SchedulerStatus,
        previous: SchedulerStatus,
    ) {
        let update = StepUpdate {
            status: status.step_status(),
            progress: status.progress(previous),
            job_id: Some(record.job_id.clone()),
            start_time: None,
            error_message: None,
        };

        self.deliver(
            &format!(
                "report {} for {}/{}",
                status, record.pipeline_id, record.step_name
            ),
            self.repo
                .update_step(&record.pipeline_id, &record.step_name, &update),
        )
        .await;
    }

    pub async fn notify_complete(&self, record: &JobRecord) {
        let complete = StepComplete {
            job_id: record.job_id.clone(),
            completion_time: Utc::now(),
        };

        self.deliver(
            &format!(
                "report completion of {}/{}",
                record.pipeline_id, record.step_name
            ),
            self.repo
                .complete_step(&record.pipeline_id, &record.step_name, &complete),
        )
        .await;
    }

    /// Reports a failed step
    ///
    /// The message is always logged, so it survives even when the control
    /// plane cannot be reached.
    pub async fn notify_failed(&self, pipeline_id: &str, step_name: &str, message: &str) {
        error!("Step {}/{} failed: {}", pipeline_id, step_name, message);

        let fail = StepFail {
            error_message: message.to_string(),
            failure_time: Utc::now(),
        };

        self.deliver(
            &format!("report failure of {}/{}", pipeline_id, step_name),
            self.repo.fail_step(pipeline_id, step_name, &fail),
        )
        .await;
    }

    pub async fn heartbeat(&self, running_jobs: usize) {
        let heartbeat = Heartbeat {
            worker_id: self.worker_id.clone(),
            timestamp: Utc::now(),
            running_jobs,
            status: "alive".to_string(),
        };

        self.deliver("send heartbeat", self.repo.send_heartbeat(&heartbeat))
            .await;
    }

    /// Asks the control plane to create a pipeline for an arrived input
    ///
    /// Unlike the reporting calls this one has a result the caller needs, so
    /// failures are returned. A pipeline created while shutdown began is
    /// still returned: the control plane already holds it.
    pub async fn create_pipeline(&self, file_name: &str) -> Result<String> {
        if self.suspended() {
            return Err(WorkerError::ShuttingDown);
        }

        let request = CreatePipeline {
            h5_img_name: file_name.to_string(),
            uploader: self.uploader.clone(),
            notification_emails: self.notification_emails.clone(),
            wait_for_image_upload: false,
        };

        Ok(self.repo.create_pipeline(&request).await?)
    }
}
