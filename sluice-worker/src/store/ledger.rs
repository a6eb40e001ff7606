//! Ledger of input files already dispatched

use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::PersistenceError;
use super::snapshot::{read_json, write_json_atomic};

/// File names the watcher has turned into pipelines, with dispatch times
///
/// Entries older than the retention window are pruned on every save.
#[derive(Debug)]
pub struct ProcessedLedger {
    path: PathBuf,
    retention: Duration,
    entries: BTreeMap<String, DateTime<Utc>>,
}

impl ProcessedLedger {
    /// Loads the ledger at `path`, starting empty if it cannot be read
    pub fn load(path: impl Into<PathBuf>, retention: Duration) -> Self {
        let path = path.into();
        match read_json::<BTreeMap<String, DateTime<Utc>>>(&path) {
            Ok(entries) => Self {
                path,
                retention,
                entries: entries.unwrap_or_default(),
            },
            Err(e) => {
                tracing::error!(
                    "Failed to load processed-file ledger from {}: {}. Starting empty.",
                    path.display(),
                    e
                );
                Self {
                    path,
                    retention,
                    entries: BTreeMap::new(),
                }
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn record(&mut self, name: impl Into<String>, at: DateTime<Utc>) {
        self.entries.insert(name.into(), at);
    }

    /// Drops entries recorded before `now - retention`; returns how many
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.retention;
        let before = self.entries.len();
        self.entries.retain(|_, at| *at >= cutoff);
        before - self.entries.len()
    }

    /// Prunes expired entries, then rewrites the snapshot
    pub fn save(&mut self) -> Result<(), PersistenceError> {
        let pruned = self.prune(Utc::now());
        if pruned > 0 {
            tracing::debug!("Pruned {} expired ledger entries", pruned);
        }

        write_json_atomic(&self.path, &self.entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed_files.json");

        let mut ledger = ProcessedLedger::load(&path, Duration::days(30));
        ledger.record("a.pyramid.h5", Utc::now());
        ledger.save().unwrap();

        let restored = ProcessedLedger::load(&path, Duration::days(30));
        assert!(restored.contains("a.pyramid.h5"));
        assert!(!restored.contains("b.pyramid.h5"));
    }

    #[test]
    fn test_prune_drops_old_entries() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();

        let mut ledger = ProcessedLedger::load(dir.path().join("ledger.json"), Duration::days(30));
        ledger.record("old.h5", now - Duration::days(31));
        ledger.record("recent.h5", now - Duration::days(29));

        assert_eq!(ledger.prune(now), 1);
        assert!(!ledger.contains("old.h5"));
        assert!(ledger.contains("recent.h5"));
    }

    #[test]
    fn test_save_prunes_first() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");

        let mut ledger = ProcessedLedger::load(&path, Duration::days(30));
        ledger.record("old.h5", Utc::now() - Duration::days(45));
        ledger.record("new.h5", Utc::now());
        ledger.save().unwrap();

        let restored = ProcessedLedger::load(&path, Duration::days(30));
        assert_eq!(restored.len(), 1);
        assert!(restored.contains("new.h5"));
    }

    #[test]
    fn test_unreadable_ledger_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.json");
        std::fs::write(&path, b"[1, 2").unwrap();

        let ledger = ProcessedLedger::load(&path, Duration::days(30));
        assert_eq!(ledger.len(), 0);
    }
}
