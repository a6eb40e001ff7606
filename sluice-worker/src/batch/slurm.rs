//! Slurm implementation of the scheduler client
//!
//! Submission runs `sbatch` on a generated job description. Status comes from
//! `squeue` while the job is live and from `sacct` once it has left the
//! queue. Every command runs under the configured timeout and is killed if
//! it overruns.

use async_trait::async_trait;
use sluice_core::{SchedulerStatus, Step};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::{Output, Stdio};
use tokio::process::Command;
use tokio::time;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::parse::{
    MAX_DETAIL_CHARS, first_line_truncated, head_lines_joined, parse_state_output,
    parse_submission_ack,
};
use super::script::{JobDescription, directive_safe};
use super::{Scheduler, SchedulerError};
use crate::config::{Config, SchedulerConfig};

/// Lines of the job's stderr log kept in an error detail
const ERR_LOG_LINES: usize = 3;

pub struct SlurmScheduler {
    config: SchedulerConfig,
    worker_id: String,
    control_plane_url: String,
    watch_dir: PathBuf,
}

impl SlurmScheduler {
    pub fn new(config: &Config) -> Self {
        Self {
            config: config.scheduler.clone(),
            worker_id: config.worker_id.clone(),
            control_plane_url: config.control_plane_url.clone(),
            watch_dir: config.watch_dir.clone(),
        }
    }

    /// Runs a scheduler command, bounded by the configured timeout
    async fn run<I, S>(&self, program: &str, args: I) -> Result<Output, SchedulerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        match time::timeout(self.config.timeout, command.output()).await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(source)) => Err(SchedulerError::Spawn {
                command: program.to_string(),
                source,
            }),
            Err(_) => Err(SchedulerError::Timeout {
                command: program.to_string(),
                after: self.config.timeout,
            }),
        }
    }

    /// Asks one query tool for the job's state
    ///
    /// `Ok(None)` means the tool ran but did not know the job.
    async fn query_with<I, S>(
        &self,
        program: &str,
        args: I,
    ) -> Result<Option<SchedulerStatus>, SchedulerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let output = self.run(program, args).await?;

        if !output.status.success() {
            debug!(
                "{} exited with {}: {}",
                program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
            return Ok(None);
        }

        Ok(parse_state_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn accounting_detail(&self, job_id: &str) -> Option<String> {
        let output = self
            .run(
                &self.config.accounting_command,
                ["-j", job_id, "-l", "-n"],
            )
            .await
            .ok()?;

        if !output.status.success() {
            return None;
        }

        first_line_truncated(&String::from_utf8_lossy(&output.stdout), MAX_DETAIL_CHARS)
    }

    async fn err_log_detail(&self, job_id: &str) -> Option<String> {
        let path = self.config.work_dir.join(format!("slurm_{}.err", job_id));
        let text = time::timeout(self.config.timeout, tokio::fs::read_to_string(&path))
            .await
            .ok()?
            .ok()?;

        head_lines_joined(&text, ERR_LOG_LINES)
    }
}

/// Folds a failed status query into a status value
fn status_for_failure(job_id: &str, err: &SchedulerError) -> SchedulerStatus {
    match err {
        SchedulerError::Timeout { .. } => {
            warn!("Status query for job {} timed out: {}", job_id, err);
            SchedulerStatus::Timeout
        }
        _ => {
            error!("Status query for job {} failed: {}", job_id, err);
            SchedulerStatus::Error
        }
    }
}

#[async_trait]
impl Scheduler for SlurmScheduler {
    async fn submit(
        &self,
        pipeline_id: &str,
        step_name: &str,
        input_file_name: &str,
    ) -> Result<String, SchedulerError> {
        let step: Step = step_name.parse()?;

        let stage_script = self.config.scripts_dir.join(step.script());
        if !tokio::fs::try_exists(&stage_script).await.unwrap_or(false) {
            return Err(SchedulerError::MissingScript(stage_script));
        }

        let image_path = self.watch_dir.join(step.input_name(input_file_name));
        let job = JobDescription {
            pipeline_id,
            step_name,
            worker_id: &self.worker_id,
            control_plane_url: &self.control_plane_url,
            stage_script: &stage_script,
            image_path: &image_path,
            config: &self.config,
        };

        let job_file = self.config.work_dir.join(format!(
            "sbatch_{}_{}_{}.sh",
            directive_safe(pipeline_id),
            directive_safe(step_name),
            Uuid::new_v4().simple()
        ));
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(SchedulerError::JobDescription)?;
        tokio::fs::write(&job_file, job.render())
            .await
            .map_err(SchedulerError::JobDescription)?;

        debug!("Submitting {} for pipeline {}", job_file.display(), pipeline_id);

        let output = self.run(&self.config.submit_command, [&job_file]).await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = match stderr.trim() {
                "" => format!("{} exited with {}", self.config.submit_command, output.status),
                text => text.to_string(),
            };
            return Err(SchedulerError::Rejected(reason));
        }

        let job_id = parse_submission_ack(&stdout)
            .ok_or_else(|| SchedulerError::UnparseableAck(stdout.trim().to_string()))?;

        info!(
            "Submitted {} for pipeline {} as job {}",
            step_name, pipeline_id, job_id
        );

        Ok(job_id)
    }

    async fn query_status(&self, job_id: &str) -> SchedulerStatus {
        let live = self
            .query_with(&self.config.queue_command, ["-j", job_id, "-h", "-o", "%T"])
            .await;

        match live {
            Ok(Some(status)) => return status,
            Ok(None) => {}
            Err(e) => return status_for_failure(job_id, &e),
        }

        let historical = self
            .query_with(
                &self.config.accounting_command,
                ["-j", job_id, "-n", "-o", "State"],
            )
            .await;

        match historical {
            Ok(Some(status)) => status,
            Ok(None) => {
                debug!("Job {} unknown to both queue and accounting", job_id);
                SchedulerStatus::Unknown
            }
            Err(e) => status_for_failure(job_id, &e),
        }
    }

    async fn error_detail(&self, job_id: &str) -> Option<String> {
        match self.accounting_detail(job_id).await {
            Some(detail) => Some(detail),
            None => self.err_log_detail(job_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Writes an executable shell script standing in for a scheduler tool
    fn fake_tool(dir: &Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.to_string_lossy().into_owned()
    }

    struct Fixture {
        dir: TempDir,
        config: Config,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let scripts = dir.path().join("stages");
            let work = dir.path().join("work");
            std::fs::create_dir_all(&scripts).unwrap();
            for step in Step::ALL {
                std::fs::write(scripts.join(step.script()), "").unwrap();
            }

            let mut config = Config::default();
            config.watch_dir = dir.path().join("incoming");
            config.scheduler.scripts_dir = scripts;
            config.scheduler.work_dir = work;
            config.scheduler.timeout = Duration::from_millis(500);
            config.scheduler.submit_command = "/nonexistent/sbatch".to_string();
            config.scheduler.queue_command = "/nonexistent/squeue".to_string();
            config.scheduler.accounting_command = "/nonexistent/sacct".to_string();

            Self { dir, config }
        }

        fn tool(&self, name: &str, body: &str) -> String {
            fake_tool(self.dir.path(), name, body)
        }

        fn scheduler(&self) -> SlurmScheduler {
            SlurmScheduler::new(&self.config)
        }

        fn job_files(&self) -> Vec<PathBuf> {
            std::fs::read_dir(&self.config.scheduler.work_dir)
                .map(|entries| entries.map(|e| e.unwrap().path()).collect())
                .unwrap_or_default()
        }
    }

    #[tokio::test]
    async fn test_submit_parses_job_id_and_writes_job_file() {
        let mut fx = Fixture::new();
        fx.config.scheduler.submit_command = fx.tool("sbatch", "echo 'Submitted batch job 4242'");

        let job_id = fx
            .scheduler()
            .submit("pl-1", "bit_conversion", "sample.pyramid.h5")
            .await
            .unwrap();
        assert_eq!(job_id, "4242");

        let files = fx.job_files();
        assert_eq!(files.len(), 1);
        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("sbatch_pl-1_bit_conversion_"));

        let text = std::fs::read_to_string(&files[0]).unwrap();
        let image = fx.config.watch_dir.join("sample.v3draw");
        assert!(text.contains(&format!("--image-path '{}'", image.display())));
    }

    #[tokio::test]
    async fn test_submit_unknown_step() {
        let fx = Fixture::new();
        let err = fx
            .scheduler()
            .submit("pl-1", "no_such_step", "a.pyramid.h5")
            .await
            .unwrap_err();

        assert!(matches!(err, SchedulerError::UnknownStep(_)));
        assert!(fx.job_files().is_empty());
    }

    #[tokio::test]
    async fn test_submit_missing_stage_script() {
        let fx = Fixture::new();
        std::fs::remove_file(
            fx.config
                .scheduler
                .scripts_dir
                .join(Step::Downsample.script()),
        )
        .unwrap();

        let err = fx
            .scheduler()
            .submit("pl-1", "downsample", "a.pyramid.h5")
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::MissingScript(_)));
    }

    #[tokio::test]
    async fn test_submit_rejected() {
        let mut fx = Fixture::new();
        fx.config.scheduler.submit_command = fx.tool(
            "sbatch",
            "echo 'sbatch: error: invalid partition specified: CPU' >&2\nexit 1",
        );

        let err = fx
            .scheduler()
            .submit("pl-1", "mip_generation", "a.pyramid.h5")
            .await
            .unwrap_err();

        match err {
            SchedulerError::Rejected(reason) => assert!(reason.contains("invalid partition")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_submit_unparseable_ack() {
        let mut fx = Fixture::new();
        fx.config.scheduler.submit_command = fx.tool("sbatch", "echo 'queued'");

        let err = fx
            .scheduler()
            .submit("pl-1", "mip_generation", "a.pyramid.h5")
            .await
            .unwrap_err();
        assert!(matches!(err, SchedulerError::UnparseableAck(_)));
    }

    #[tokio::test]
    async fn test_query_live_queue() {
        let mut fx = Fixture::new();
        fx.config.scheduler.queue_command = fx.tool("squeue", "echo RUNNING");

        assert_eq!(
            fx.scheduler().query_status("4242").await,
            SchedulerStatus::Running
        );
    }

    #[tokio::test]
    async fn test_query_falls_back_to_accounting() {
        let mut fx = Fixture::new();
        fx.config.scheduler.queue_command = fx.tool(
            "squeue",
            "echo 'slurm_load_jobs error: Invalid job id specified' >&2\nexit 1",
        );
        fx.config.scheduler.accounting_command =
            fx.tool("sacct", "echo ' COMPLETED '\necho ' COMPLETED '");

        assert_eq!(
            fx.scheduler().query_status("4242").await,
            SchedulerStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_query_unknown_when_both_silent() {
        let mut fx = Fixture::new();
        fx.config.scheduler.queue_command = fx.tool("squeue", "exit 0");
        fx.config.scheduler.accounting_command = fx.tool("sacct", "exit 0");

        assert_eq!(
            fx.scheduler().query_status("4242").await,
            SchedulerStatus::Unknown
        );
    }

    #[tokio::test]
    async fn test_query_timeout() {
        let mut fx = Fixture::new();
        fx.config.scheduler.timeout = Duration::from_millis(100);
        fx.config.scheduler.queue_command = fx.tool("squeue", "sleep 5");

        assert_eq!(
            fx.scheduler().query_status("4242").await,
            SchedulerStatus::Timeout
        );
    }

    #[tokio::test]
    async fn test_query_error_when_tool_missing() {
        let fx = Fixture::new();
        assert_eq!(
            fx.scheduler().query_status("4242").await,
            SchedulerStatus::Error
        );
    }

    #[tokio::test]
    async fn test_error_detail_from_accounting() {
        let mut fx = Fixture::new();
        let long = "y".repeat(300);
        fx.config.scheduler.accounting_command = fx.tool("sacct", &format!("echo '{}'", long));

        let detail = fx.scheduler().error_detail("4242").await.unwrap();
        assert_eq!(detail.chars().count(), MAX_DETAIL_CHARS + 3);
        assert!(detail.ends_with("..."));
    }

    #[tokio::test]
    async fn test_error_detail_from_err_log() {
        let fx = Fixture::new();
        std::fs::create_dir_all(&fx.config.scheduler.work_dir).unwrap();
        std::fs::write(
            fx.config.scheduler.work_dir.join("slurm_4242.err"),
            "Traceback (most recent call last):\n  File \"stage.py\"\nMemoryError\nignored\n",
        )
        .unwrap();

        let detail = fx.scheduler().error_detail("4242").await.unwrap();
        assert_eq!(
            detail,
            "Traceback (most recent call last): File \"stage.py\" MemoryError"
        );
    }

    #[tokio::test]
    async fn test_error_detail_none() {
        let fx = Fixture::new();
        assert_eq!(fx.scheduler().error_detail("4242").await, None);
    }
}
