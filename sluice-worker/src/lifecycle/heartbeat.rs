//! Heartbeat loop

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::service::Notifier;
use crate::store::JobStore;

/// Reports liveness and the active job count until shutdown
pub async fn run_heartbeat(
    notifier: Arc<Notifier>,
    store: Arc<Mutex<JobStore>>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    info!("Starting heartbeat loop (interval: {:?})", interval);

    let mut ticker = time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let running_jobs = store.lock().await.len();
        debug!("Sending heartbeat ({} running job(s))", running_jobs);
        notifier.heartbeat(running_jobs).await;
    }

    info!("Heartbeat loop stopped");
}
