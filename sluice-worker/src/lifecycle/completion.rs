//! Completion handling
//!
//! Runs once per job when the scheduler reports a terminal state. A job the
//! scheduler calls `COMPLETED` only counts as complete if its expected output
//! artifact exists; otherwise it is reported as a failure.

use sluice_core::{JobRecord, SchedulerStatus, Step};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::batch::Scheduler;
use crate::error::WorkerError;
use crate::service::{Archiver, Notifier, image_id};

/// What completion handling reported for a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Completed,
    Failed(String),
}

pub struct CompletionHandler {
    scheduler: Arc<dyn Scheduler>,
    archiver: Arc<dyn Archiver>,
    notifier: Arc<Notifier>,
    watch_dir: PathBuf,
}

impl CompletionHandler {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        archiver: Arc<dyn Archiver>,
        notifier: Arc<Notifier>,
        watch_dir: PathBuf,
    ) -> Self {
        Self {
            scheduler,
            archiver,
            notifier,
            watch_dir,
        }
    }

    pub async fn handle(&self, record: &JobRecord, status: SchedulerStatus) -> CompletionOutcome {
        if status != SchedulerStatus::Completed {
            return self.fail(record, status, None).await;
        }

        if let Err(e) = self.verify_artifact(record) {
            return self.fail(record, status, Some(e.to_string())).await;
        }

        if let Err(e) = self.archive(record).await {
            let message = format!(
                "Scheduler job {} completed but archiving its output failed: {:#}",
                record.job_id, e
            );
            self.notifier
                .notify_failed(&record.pipeline_id, &record.step_name, &message)
                .await;
            return CompletionOutcome::Failed(message);
        }

        info!(
            "Job {} for {}/{} completed",
            record.job_id, record.pipeline_id, record.step_name
        );
        self.notifier.notify_complete(record).await;
        CompletionOutcome::Completed
    }

    /// Checks that a successful job left its output in the watched directory
    fn verify_artifact(&self, record: &JobRecord) -> Result<(), WorkerError> {
        let Ok(step) = record.step_name.parse::<Step>() else {
            return Ok(());
        };
        let Some(expected) = step.expected_output(record.input_name()) else {
            return Ok(());
        };

        if self.watch_dir.join(&expected).exists() {
            Ok(())
        } else {
            Err(WorkerError::ArtifactMissing {
                job_id: record.job_id.clone(),
                expected,
            })
        }
    }

    /// Sorts then promotes the job's image when it produced a summary image
    async fn archive(&self, record: &JobRecord) -> anyhow::Result<()> {
        let derives_summary = record
            .step_name
            .parse::<Step>()
            .is_ok_and(|step| step.derives_summary_image());
        if !derives_summary {
            return Ok(());
        }

        let Some(image_id) = image_id(record.input_name()).map(String::from) else {
            warn!(
                "No image identifier in {:?}; skipping archival for job {}",
                record.input_name(),
                record.job_id
            );
            return Ok(());
        };

        let archiver = self.archiver.clone();
        tokio::task::spawn_blocking(move || {
            archiver.sort(&image_id)?;
            archiver.promote(&image_id)
        })
        .await?
    }

    async fn fail(
        &self,
        record: &JobRecord,
        status: SchedulerStatus,
        reason: Option<String>,
    ) -> CompletionOutcome {
        let mut message = format!(
            "Scheduler job {} failed, final state: {}",
            record.job_id, status
        );
        if let Some(reason) = reason {
            message.push_str(", ");
            message.push_str(&reason);
        }
        if let Some(detail) = self.scheduler.error_detail(&record.job_id).await {
            message.push_str(". Details: ");
            message.push_str(&detail);
        }

        self.notifier
            .notify_failed(&record.pipeline_id, &record.step_name, &message)
            .await;
        CompletionOutcome::Failed(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ControlPlaneCall, Harness};
    use sluice_core::JobKey;

    fn mip_record(input: &str) -> JobRecord {
        JobRecord::submitted(
            &JobKey::new("pl-1", "mip_generation"),
            "4242",
            Some(input.to_string()),
        )
    }

    #[tokio::test]
    async fn test_missing_artifact_is_a_failure() {
        let harness = Harness::new();
        let record = mip_record("P1-T1-R1-S1.pyramid.h5");

        let outcome = harness
            .completion()
            .handle(&record, SchedulerStatus::Completed)
            .await;

        let CompletionOutcome::Failed(message) = outcome else {
            panic!("expected failure, got {outcome:?}");
        };
        assert!(message.contains("4242"));
        assert!(message.contains("COMPLETED"));
        assert!(message.contains("no output artifact found"));
        assert!(harness.archiver.calls().is_empty());

        let calls = harness.control_plane.calls();
        assert!(matches!(calls.as_slice(), [ControlPlaneCall::Fail { .. }]));
    }

    #[tokio::test]
    async fn test_summary_image_is_archived_in_order() {
        let harness = Harness::new();
        harness.touch_watched("P1-T1-R1-S1_MIP.tif");
        let record = mip_record("P1-T1-R1-S1.pyramid.h5");

        let outcome = harness
            .completion()
            .handle(&record, SchedulerStatus::Completed)
            .await;

        assert_eq!(outcome, CompletionOutcome::Completed);
        assert_eq!(
            harness.archiver.calls(),
            vec![
                "sort P1-T1-R1-S1".to_string(),
                "promote P1-T1-R1-S1".to_string()
            ]
        );
        assert!(matches!(
            harness.control_plane.calls().as_slice(),
            [ControlPlaneCall::Complete { .. }]
        ));
    }

    #[tokio::test]
    async fn test_archival_failure_is_reported() {
        let harness = Harness::new();
        harness.touch_watched("P1-T1-R1-S1_MIP.tif");
        harness.archiver.fail_promote(true);

        let outcome = harness
            .completion()
            .handle(&mip_record("P1-T1-R1-S1.pyramid.h5"), SchedulerStatus::Completed)
            .await;

        assert!(matches!(outcome, CompletionOutcome::Failed(ref m) if m.contains("archiving")));
    }

    #[tokio::test]
    async fn test_non_summary_step_skips_archival() {
        let harness = Harness::new();
        harness.touch_watched("sample_8bit.v3draw");
        let record = JobRecord::submitted(
            &JobKey::new("pl-1", "bit_conversion"),
            "7",
            Some("sample.pyramid.h5".to_string()),
        );

        let outcome = harness
            .completion()
            .handle(&record, SchedulerStatus::Completed)
            .await;

        assert_eq!(outcome, CompletionOutcome::Completed);
        assert!(harness.archiver.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_state_includes_detail() {
        let harness = Harness::new();
        harness
            .scheduler
            .set_error_detail("4242", "OUT_OF_MEMORY exit 0:125");

        let outcome = harness
            .completion()
            .handle(
                &mip_record("P1-T1-R1-S1.pyramid.h5"),
                SchedulerStatus::OutOfMemory,
            )
            .await;

        assert_eq!(
            outcome,
            CompletionOutcome::Failed(
                "Scheduler job 4242 failed, final state: OUT_OF_MEMORY. Details: OUT_OF_MEMORY exit 0:125"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_no_input_means_no_artifact_check() {
        let harness = Harness::new();
        let record = JobRecord::submitted(&JobKey::new("pl-1", "downsample"), "9", None);

        let outcome = harness
            .completion()
            .handle(&record, SchedulerStatus::Completed)
            .await;

        assert_eq!(outcome, CompletionOutcome::Completed);
    }
}
