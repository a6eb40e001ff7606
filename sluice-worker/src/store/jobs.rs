//! Durable set of active job records

use sluice_core::{JobKey, JobRecord};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::PersistenceError;
use super::snapshot::{read_json, write_json_atomic};

/// Active job records keyed by (pipeline, step)
///
/// The snapshot is a JSON object whose keys are `"<pipeline>/<step>"`. On
/// load the key is rebuilt from each record's own fields, so snapshots
/// written with a different key convention still restore correctly.
#[derive(Debug)]
pub struct JobStore {
    path: PathBuf,
    records: BTreeMap<JobKey, JobRecord>,
}

impl JobStore {
    /// Loads the snapshot at `path`
    ///
    /// An unreadable or malformed snapshot is logged and the store starts
    /// empty; the next save replaces it.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::try_load(&path) {
            Ok(store) => {
                if !store.is_empty() {
                    tracing::info!(
                        "Restored {} job record(s) from {}",
                        store.len(),
                        path.display()
                    );
                }
                store
            }
            Err(e) => {
                tracing::error!(
                    "Failed to load job records from {}: {}. Starting empty.",
                    path.display(),
                    e
                );
                Self::empty(path)
            }
        }
    }

    pub fn try_load(path: &Path) -> Result<Self, PersistenceError> {
        let stored: Option<BTreeMap<String, JobRecord>> = read_json(path)?;
        let records = stored
            .unwrap_or_default()
            .into_values()
            .map(|record| (record.key(), record))
            .collect();

        Ok(Self {
            path: path.to_path_buf(),
            records,
        })
    }

    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, key: &JobKey) -> Option<&JobRecord> {
        self.records.get(key)
    }

    pub fn get_mut(&mut self, key: &JobKey) -> Option<&mut JobRecord> {
        self.records.get_mut(key)
    }

    pub fn keys(&self) -> Vec<JobKey> {
        self.records.keys().cloned().collect()
    }

    /// Copies of every record, ordered by key
    pub fn snapshot(&self) -> Vec<JobRecord> {
        self.records.values().cloned().collect()
    }

    /// Inserts or replaces the record under its own key
    pub fn insert(&mut self, record: JobRecord) -> Option<JobRecord> {
        self.records.insert(record.key(), record)
    }

    pub fn remove(&mut self, key: &JobKey) -> Option<JobRecord> {
        self.records.remove(key)
    }

    /// Rewrites the snapshot file with the current records
    pub fn save(&self) -> Result<(), PersistenceError> {
        let stored: BTreeMap<String, &JobRecord> = self
            .records
            .iter()
            .map(|(key, record)| (key.to_string(), record))
            .collect();

        write_json_atomic(&self.path, &stored)
    }

    /// Saves, logging instead of propagating a failure
    pub fn save_or_log(&self) {
        if let Err(e) = self.save() {
            tracing::error!(
                "Failed to persist job records to {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
