//! Job lifecycle
//!
//! Background work that follows submitted jobs to the end:
//! - `JobMonitor`: fixed-interval reconciliation of scheduler state with the
//!   job store
//! - `RecoveryVerifier`: one-shot re-validation of records restored at startup
//! - `CompletionHandler`: artifact check, archival and final notification
//! - heartbeat loop keeping the worker marked alive

mod completion;
mod heartbeat;
mod monitor;
mod recovery;

pub use completion::{CompletionHandler, CompletionOutcome};
pub use heartbeat::run_heartbeat;
pub use monitor::JobMonitor;
pub use recovery::RecoveryVerifier;
