//! Recovery verifier
//!
//! Re-validates job records restored from disk before the regular monitor
//! loop takes over. The scheduler is the source of truth: a restored job it
//! reports as finished gets its completion handling now instead of waiting
//! for the first monitor tick.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::lifecycle::JobMonitor;
use crate::store::JobStore;

pub struct RecoveryVerifier {
    monitor: Arc<JobMonitor>,
    store: Arc<Mutex<JobStore>>,
    delay: Duration,
    shutdown: CancellationToken,
}

impl RecoveryVerifier {
    pub fn new(
        monitor: Arc<JobMonitor>,
        store: Arc<Mutex<JobStore>>,
        delay: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            monitor,
            store,
            delay,
            shutdown,
        }
    }

    /// Waits out the startup delay, then verifies once
    pub async fn run(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => return,
            _ = tokio::time::sleep(self.delay) => {}
        }

        self.run_once().await;
    }

    /// Checks every restored record against the scheduler
    ///
    /// # Returns
    /// Number of restored jobs that had already finished
    pub async fn run_once(&self) -> usize {
        let keys = self.store.lock().await.keys();
        info!("Verifying {} restored job(s)", keys.len());

        let mut finished = 0;
        for key in &keys {
            if self.shutdown.is_cancelled() {
                break;
            }

            let status = self.monitor.reconcile(key).await;
            if status.is_some_and(|s| s.is_terminal()) {
                finished += 1;
            }
        }

        self.store.lock().await.save_or_log();

        info!(
            "Recovery complete: {} finished, {} still active",
            finished,
            keys.len() - finished
        );
        finished
    }
}
