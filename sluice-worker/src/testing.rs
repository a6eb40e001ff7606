//! Test doubles and fixtures shared by the worker's unit tests

use async_trait::async_trait;
use sluice_client::ClientError;
use sluice_core::dto::pipeline::{CreatePipeline, Heartbeat, StepComplete, StepFail, StepUpdate};
use sluice_core::{JobRecord, SchedulerStatus, Step};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::api::AppState;
use crate::batch::{Scheduler, SchedulerError};
use crate::config::{Config, StabilityConfig};
use crate::lifecycle::{CompletionHandler, JobMonitor, RecoveryVerifier};
use crate::repository::ControlPlaneRepository;
use crate::service::{Archiver, Notifier, Orchestrator};
use crate::store::{JobStore, ProcessedLedger};
use crate::watcher::{ArrivalWatcher, WatcherHandle};

#[derive(Debug, Clone)]
pub struct Submission {
    pub pipeline_id: String,
    pub step_name: String,
    pub input_file_name: String,
    pub transformed_input: String,
}

/// Scheduler double with queued submission results and fixed statuses
///
/// Jobs without a configured status report `RUNNING`.
#[derive(Default)]
pub struct ScriptedScheduler {
    results: StdMutex<VecDeque<Result<String, SchedulerError>>>,
    submissions: StdMutex<Vec<Submission>>,
    statuses: StdMutex<HashMap<String, SchedulerStatus>>,
    details: StdMutex<HashMap<String, String>>,
    queried: StdMutex<Vec<String>>,
}

impl ScriptedScheduler {
    pub fn push_submission(&self, result: Result<String, SchedulerError>) {
        self.results.lock().unwrap().push_back(result);
    }

    pub fn set_status(&self, job_id: &str, status: SchedulerStatus) {
        self.statuses
            .lock()
            .unwrap()
            .insert(job_id.to_string(), status);
    }

    pub fn set_error_detail(&self, job_id: &str, detail: &str) {
        self.details
            .lock()
            .unwrap()
            .insert(job_id.to_string(), detail.to_string());
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.submissions.lock().unwrap().clone()
    }

    pub fn queried(&self) -> Vec<String> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl Scheduler for ScriptedScheduler {
    async fn submit(
        &self,
        pipeline_id: &str,
        step_name: &str,
        input_file_name: &str,
    ) -> Result<String, SchedulerError> {
        let step: Step = step_name.parse()?;

        // Give concurrent callers a chance to interleave
        tokio::task::yield_now().await;

        let count = {
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push(Submission {
                pipeline_id: pipeline_id.to_string(),
                step_name: step_name.to_string(),
                input_file_name: input_file_name.to_string(),
                transformed_input: step.input_name(input_file_name),
            });
            submissions.len()
        };

        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(format!("{}", 1000 + count)))
    }

    async fn query_status(&self, job_id: &str) -> SchedulerStatus {
        self.queried.lock().unwrap().push(job_id.to_string());
        self.statuses
            .lock()
            .unwrap()
            .get(job_id)
            .copied()
            .unwrap_or(SchedulerStatus::Running)
    }

    async fn error_detail(&self, job_id: &str) -> Option<String> {
        self.details.lock().unwrap().get(job_id).cloned()
    }
}

#[derive(Debug, Clone)]
pub enum ControlPlaneCall {
    CreatePipeline(CreatePipeline),
    Update {
        pipeline_id: String,
        step_name: String,
        update: StepUpdate,
    },
    Complete {
        pipeline_id: String,
        step_name: String,
        complete: StepComplete,
    },
    Fail {
        pipeline_id: String,
        step_name: String,
        fail: StepFail,
    },
    Heartbeat(Heartbeat),
}

/// Control plane double that records every call it receives
#[derive(Default)]
pub struct RecordingControlPlane {
    calls: StdMutex<Vec<ControlPlaneCall>>,
    closed: AtomicBool,
    failing: AtomicBool,
}

impl RecordingControlPlane {
    pub fn calls(&self) -> Vec<ControlPlaneCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Makes every subsequent call answer with a server error
    pub fn fail_calls(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn record(&self, call: ControlPlaneCall) -> sluice_client::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ClientError::Closed);
        }
        self.calls.lock().unwrap().push(call);

        if self.failing.load(Ordering::SeqCst) {
            Err(ClientError::api_error(500, "scripted failure"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ControlPlaneRepository for RecordingControlPlane {
    async fn create_pipeline(&self, request: &CreatePipeline) -> sluice_client::Result<String> {
        self.record(ControlPlaneCall::CreatePipeline(request.clone()))?;
        Ok(format!("pl-{}", request.h5_img_name))
    }

    async fn update_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        update: &StepUpdate,
    ) -> sluice_client::Result<()> {
        self.record(ControlPlaneCall::Update {
            pipeline_id: pipeline_id.to_string(),
            step_name: step_name.to_string(),
            update: update.clone(),
        })
    }

    async fn complete_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        complete: &StepComplete,
    ) -> sluice_client::Result<()> {
        self.record(ControlPlaneCall::Complete {
            pipeline_id: pipeline_id.to_string(),
            step_name: step_name.to_string(),
            complete: complete.clone(),
        })
    }

    async fn fail_step(
        &self,
        pipeline_id: &str,
        step_name: &str,
        fail: &StepFail,
    ) -> sluice_client::Result<()> {
        self.record(ControlPlaneCall::Fail {
            pipeline_id: pipeline_id.to_string(),
            step_name: step_name.to_string(),
            fail: fail.clone(),
        })
    }

    async fn send_heartbeat(&self, heartbeat: &Heartbeat) -> sluice_client::Result<()> {
        self.record(ControlPlaneCall::Heartbeat(heartbeat.clone()))
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Archiver double that records `"sort <id>"` / `"promote <id>"`
#[derive(Default)]
pub struct RecordingArchiver {
    calls: StdMutex<Vec<String>>,
    fail_promote: AtomicBool,
}

impl RecordingArchiver {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail_promote(&self, fail: bool) {
        self.fail_promote.store(fail, Ordering::SeqCst);
    }
}

impl Archiver for RecordingArchiver {
    fn sort(&self, image_id: &str) -> anyhow::Result<usize> {
        self.calls.lock().unwrap().push(format!("sort {}", image_id));
        Ok(1)
    }

    fn promote(&self, image_id: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("promote {}", image_id));
        if self.fail_promote.load(Ordering::SeqCst) {
            anyhow::bail!("scripted promote failure");
        }
        Ok(())
    }
}

/// A fully wired worker over test doubles and a temporary directory
pub struct Harness {
    pub dir: TempDir,
    pub config: Config,
    pub shutdown: CancellationToken,
    pub scheduler: Arc<ScriptedScheduler>,
    pub control_plane: Arc<RecordingControlPlane>,
    pub archiver: Arc<RecordingArchiver>,
    pub notifier: Arc<Notifier>,
    pub store: Arc<Mutex<JobStore>>,
    pub ledger: Arc<Mutex<ProcessedLedger>>,
    pub watcher_handle: WatcherHandle,
}

impl Harness {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();

        let mut config = Config::new("worker_test".to_string(), "http://localhost:8000".to_string());
        config.watch_dir = dir.path().join("incoming");
        config.job_store_path = dir.path().join("running_jobs.json");
        config.ledger_path = dir.path().join("processed_files.json");
        config.job_check_interval = Duration::from_millis(10);
        config.watch_interval = Duration::from_millis(10);
        config.recovery_delay = Duration::ZERO;
        config.stability = StabilityConfig {
            required_stable_reads: 3,
            sample_interval: Duration::from_millis(5),
            max_wait: Duration::from_millis(100),
        };
        std::fs::create_dir_all(&config.watch_dir).unwrap();

        let shutdown = CancellationToken::new();
        let control_plane = Arc::new(RecordingControlPlane::default());
        let notifier = Arc::new(Notifier::new(
            control_plane.clone(),
            shutdown.clone(),
            &config,
        ));

        Self {
            store: Arc::new(Mutex::new(JobStore::load(&config.job_store_path))),
            ledger: Arc::new(Mutex::new(ProcessedLedger::load(
                &config.ledger_path,
                config.ledger_retention,
            ))),
            dir,
            config,
            shutdown,
            scheduler: Arc::new(ScriptedScheduler::default()),
            control_plane,
            archiver: Arc::new(RecordingArchiver::default()),
            notifier,
            watcher_handle: WatcherHandle::default(),
        }
    }

    pub fn job_store_path(&self) -> &Path {
        &self.config.job_store_path
    }

    /// Inserts and persists a record, as if restored from a previous run
    pub fn seed(&self, record: JobRecord) {
        let mut store = self.store.try_lock().expect("store is free during setup");
        store.insert(record);
        store.save().unwrap();
    }

    pub fn write_watched(&self, name: &str, contents: &[u8]) {
        std::fs::write(self.config.watch_dir.join(name), contents).unwrap();
    }

    pub fn touch_watched(&self, name: &str) {
        self.write_watched(name, b"x");
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.config.worker_id.clone(),
            self.scheduler.clone(),
            self.store.clone(),
            self.notifier.clone(),
            self.shutdown.clone(),
        )
    }

    pub fn completion(&self) -> CompletionHandler {
        CompletionHandler::new(
            self.scheduler.clone(),
            self.archiver.clone(),
            self.notifier.clone(),
            self.config.watch_dir.clone(),
        )
    }

    pub fn monitor(&self) -> JobMonitor {
        JobMonitor::new(
            self.scheduler.clone(),
            self.store.clone(),
            self.notifier.clone(),
            Arc::new(self.completion()),
            self.config.job_check_interval,
            self.shutdown.clone(),
        )
    }

    pub fn recovery(&self) -> RecoveryVerifier {
        RecoveryVerifier::new(
            Arc::new(self.monitor()),
            self.store.clone(),
            self.config.recovery_delay,
            self.shutdown.clone(),
        )
    }

    pub fn watcher(&self) -> ArrivalWatcher {
        ArrivalWatcher::new(
            &self.config,
            self.ledger.clone(),
            self.notifier.clone(),
            self.watcher_handle.clone(),
            self.shutdown.clone(),
        )
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            worker_id: self.config.worker_id.clone(),
            orchestrator: Arc::new(self.orchestrator()),
            ledger: self.ledger.clone(),
            watcher: self.watcher_handle.clone(),
            watch_dir: self.config.watch_dir.clone(),
        }
    }
}
