//! Job monitor
//!
//! Polls the scheduler for every active job on a fixed interval. A status
//! change is persisted and reported; a terminal status triggers completion
//! handling, after which the record is dropped from the store.
//!
//! Only the latest observed state is acted on. A job that moves through
//! several states between two ticks is reported once, with the last one.
//!
//! Once shutdown begins the notifier stays silent, so an observation made
//! after that point is not applied: the record is left as it was for the
//! recovery verifier of the next run.

use chrono::Utc;
use sluice_core::{JobKey, SchedulerStatus};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::batch::Scheduler;
use crate::lifecycle::CompletionHandler;
use crate::service::Notifier;
use crate::store::JobStore;

pub struct JobMonitor {
    scheduler: Arc<dyn Scheduler>,
    store: Arc<Mutex<JobStore>>,
    notifier: Arc<Notifier>,
    completion: Arc<CompletionHandler>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl JobMonitor {
    pub fn new(
        scheduler: Arc<dyn Scheduler>,
        store: Arc<Mutex<JobStore>>,
        notifier: Arc<Notifier>,
        completion: Arc<CompletionHandler>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            scheduler,
            store,
            notifier,
            completion,
            interval,
            shutdown,
        }
    }

    /// Runs the polling loop until shutdown
    ///
    /// Each tick runs in its own task so that a panic while handling one
    /// tick is logged and the loop carries on.
    pub async fn run(self: Arc<Self>) {
        info!("Starting job monitor (interval: {:?})", self.interval);

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let monitor = Arc::clone(&self);
            match tokio::spawn(async move { monitor.check_once().await }).await {
                Ok(finished) if finished > 0 => {
                    info!("{} job(s) finished this cycle", finished)
                }
                Ok(_) => {}
                Err(e) => warn!("Monitor tick panicked: {}", e),
            }
        }

        info!("Job monitor stopped");
    }

    /// Checks every active job once
    ///
    /// # Returns
    /// Number of jobs that reached a terminal state
    pub async fn check_once(&self) -> usize {
        let keys = self.store.lock().await.keys();
        if keys.is_empty() {
            debug!("No active jobs");
            return 0;
        }

        let mut finished = 0;
        for key in keys {
            if self.shutdown.is_cancelled() {
                debug!("Shutdown requested, ending monitor pass");
                break;
            }

            let status = self.reconcile(&key).await;
            if status.is_some_and(|s| s.is_terminal()) {
                finished += 1;
            }
        }

        finished
    }

    /// Brings one record in line with the scheduler
    ///
    /// # Returns
    /// The observed status, or `None` if the record disappeared meanwhile
    pub(crate) async fn reconcile(&self, key: &JobKey) -> Option<SchedulerStatus> {
        let job_id = self.store.lock().await.get(key)?.job_id.clone();

        let status = self.scheduler.query_status(&job_id).await;

        if self.shutdown.is_cancelled() {
            debug!(
                "Shutdown requested, leaving job {} for {} to recovery",
                job_id, key
            );
            return Some(status);
        }

        let (record, previous) = {
            let mut store = self.store.lock().await;
            let record = store.get_mut(key).filter(|r| r.job_id == job_id)?;

            let previous = record.status;
            record.status = status;
            record.last_check_time = Utc::now();
            let record = record.clone();

            if previous != status {
                store.save_or_log();
            }
            (record, previous)
        };

        if previous != status {
            info!(
                "Job {} for {}: {} -> {}",
                job_id, key, previous, status
            );
            self.notifier
                .notify_progress(&record, status, previous)
                .await;
        }

        if status.is_terminal() {
            self.completion.handle(&record, status).await;

            if self.shutdown.is_cancelled() {
                warn!(
                    "Shutdown began while finishing job {} for {}, keeping it for recovery",
                    job_id, key
                );
                return Some(status);
            }

            let mut store = self.store.lock().await;
            if store.get(key).is_some_and(|r| r.job_id == job_id) {
                store.remove(key);
                store.save_or_log();
            }
        }

        Some(status)
    }
}
