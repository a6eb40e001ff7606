//! Persistence layer
//!
//! Whole-file JSON snapshots of the worker's durable state:
//! - `JobStore`: active job records, one per (pipeline, step)
//! - `ProcessedLedger`: input file names already dispatched by the watcher
//!
//! Both are loaded in full at startup and rewritten atomically on every
//! mutation. Record counts are small, so snapshotting stays cheap.

mod jobs;
mod ledger;
mod snapshot;

use std::path::PathBuf;
use thiserror::Error;

pub use jobs::JobStore;
pub use ledger::ProcessedLedger;

/// Failure reading or writing a snapshot file
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed snapshot: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("invalid snapshot path: {}", .0.display())]
    InvalidPath(PathBuf),
}
