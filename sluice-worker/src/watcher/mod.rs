//! Arrival watcher
//!
//! Polls the watched directory for uploaded `.h5` volumes and asks the
//! control plane to create a pipeline for each new one. File names already in
//! the processed-file ledger are never dispatched again; a file is only
//! dispatched once its size has settled.

mod stability;

use chrono::{DateTime, Utc};
use sluice_core::dto::worker::WatcherState;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{Config, StabilityConfig};
use crate::service::Notifier;
use crate::store::ProcessedLedger;

pub use stability::wait_for_stable;

/// Extension of the volumes that trigger a pipeline
const WATCHED_EXTENSION: &str = "h5";

#[derive(Debug, Default)]
struct Liveness {
    started: bool,
    alive: bool,
    last_poll: Option<DateTime<Utc>>,
}

/// Shared view of the watcher's liveness, read by the status endpoint
#[derive(Debug, Clone, Default)]
pub struct WatcherHandle {
    inner: Arc<std::sync::Mutex<Liveness>>,
}

impl WatcherHandle {
    fn update(&self, f: impl FnOnce(&mut Liveness)) {
        let mut liveness = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut liveness);
    }

    fn read<T>(&self, f: impl FnOnce(&Liveness) -> T) -> T {
        let liveness = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        f(&liveness)
    }

    pub fn state(&self) -> WatcherState {
        self.read(|l| match (l.started, l.alive) {
            (false, _) => WatcherState::NotRunning,
            (true, true) => WatcherState::Running,
            (true, false) => WatcherState::Stopped,
        })
    }

    pub fn is_alive(&self) -> bool {
        self.read(|l| l.alive)
    }

    pub fn last_poll(&self) -> Option<DateTime<Utc>> {
        self.read(|l| l.last_poll)
    }
}

pub struct ArrivalWatcher {
    watch_dir: PathBuf,
    interval: Duration,
    stability: StabilityConfig,
    ledger: Arc<Mutex<ProcessedLedger>>,
    notifier: Arc<Notifier>,
    handle: WatcherHandle,
    shutdown: CancellationToken,
}

impl ArrivalWatcher {
    pub fn new(
        config: &Config,
        ledger: Arc<Mutex<ProcessedLedger>>,
        notifier: Arc<Notifier>,
        handle: WatcherHandle,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            watch_dir: config.watch_dir.clone(),
            interval: config.watch_interval,
            stability: config.stability.clone(),
            ledger,
            notifier,
            handle,
            shutdown,
        }
    }

    /// Polls until shutdown
    pub async fn run(&self) {
        info!(
            "Watching {} for new volumes (interval: {:?})",
            self.watch_dir.display(),
            self.interval
        );
        self.handle.update(|l| {
            l.started = true;
            l.alive = true;
        });

        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let dispatched = self.poll_once().await;
            if dispatched > 0 {
                info!("Dispatched {} new volume(s)", dispatched);
            }
        }

        self.handle.update(|l| l.alive = false);
        info!("Arrival watcher stopped");
    }

    /// Scans the directory once and dispatches every new, settled volume
    ///
    /// # Returns
    /// Number of pipelines created
    pub async fn poll_once(&self) -> usize {
        self.handle.update(|l| l.last_poll = Some(Utc::now()));

        let candidates = match scan(&self.watch_dir).await {
            Ok(candidates) => candidates,
            Err(e) => {
                warn!("Failed to scan {}: {}", self.watch_dir.display(), e);
                return 0;
            }
        };

        let mut dispatched = 0;
        for (name, path) in candidates {
            if self.shutdown.is_cancelled() {
                break;
            }

            if self.ledger.lock().await.contains(&name) {
                continue;
            }

            if !wait_for_stable(&path, &self.stability, &self.shutdown).await {
                debug!("{} is still being written, will check again", name);
                continue;
            }

            if self.dispatch(&name).await {
                dispatched += 1;
            }
        }

        dispatched
    }

    async fn dispatch(&self, name: &str) -> bool {
        match self.notifier.create_pipeline(name).await {
            Ok(pipeline_id) => {
                info!("Created pipeline {} for {}", pipeline_id, name);

                let mut ledger = self.ledger.lock().await;
                ledger.record(name, Utc::now());
                if let Err(e) = ledger.save() {
                    error!(
                        "Failed to persist ledger to {}: {}",
                        ledger.path().display(),
                        e
                    );
                }
                true
            }
            Err(e) => {
                warn!("Failed to create pipeline for {}: {}", name, e);
                false
            }
        }
    }
}

/// Non-empty `.h5` files directly inside `dir`, sorted by name
async fn scan(dir: &Path) -> std::io::Result<Vec<(String, PathBuf)>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut found = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(WATCHED_EXTENSION) {
            continue;
        }

        if !is_candidate(&path, entry.metadata().await) {
            continue;
        }

        found.push((entry.file_name().to_string_lossy().into_owned(), path));
    }

    found.sort();
    Ok(found)
}

/// Uploads may be renamed between listing and inspection, so a failed
/// lookup only skips the entry
fn is_candidate(path: &Path, metadata: std::io::Result<std::fs::Metadata>) -> bool {
    match metadata {
        Ok(metadata) => metadata.is_file() && metadata.len() > 0,
        Err(e) => {
            debug!("Skipping {}: {}", path.display(), e);
            false
        }
    }
}
