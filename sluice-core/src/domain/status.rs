//! Scheduler and step status types
//!
//! `SchedulerStatus` is the closed vocabulary reported by the batch
//! scheduler. Raw scheduler tokens are parsed exactly once, at the
//! scheduler boundary, via [`SchedulerStatus::from_token`].
//!
//! `StepStatus` is the reduced status reported to the control plane.

use serde::{Deserialize, Serialize};

/// Job state as reported by the batch scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchedulerStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
    Timeout,
    NodeFail,
    OutOfMemory,
    Unknown,
    Error,
}

impl SchedulerStatus {
    /// Parses a single scheduler state token
    ///
    /// Accepts the decorations the scheduler adds to state words
    /// (`CANCELLED+`, `CANCELLED by 1001`). Transitional states are folded
    /// into the closest member of the vocabulary; anything unrecognised
    /// becomes `Unknown`.
    pub fn from_token(token: &str) -> Self {
        let word = token
            .split_whitespace()
            .next()
            .unwrap_or("")
            .trim_end_matches('+')
            .to_ascii_uppercase();

        match word.as_str() {
            "PENDING" | "REQUEUED" | "REQUEUE_HOLD" | "REQUEUE_FED" | "RESV_DEL_HOLD" => {
                Self::Pending
            }
            "RUNNING" | "CONFIGURING" | "COMPLETING" | "SUSPENDED" | "STOPPED" | "RESIZING"
            | "SIGNALING" | "STAGE_OUT" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" | "BOOT_FAIL" | "DEADLINE" | "PREEMPTED" | "REVOKED" => Self::Failed,
            "CANCELLED" => Self::Cancelled,
            "TIMEOUT" => Self::Timeout,
            "NODE_FAIL" => Self::NodeFail,
            "OUT_OF_MEMORY" => Self::OutOfMemory,
            "ERROR" => Self::Error,
            _ => Self::Unknown,
        }
    }

    /// Returns true if no further transition can happen from this state
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending | Self::Running)
    }

    /// Collapses the scheduler vocabulary into the control plane's step status
    pub fn step_status(&self) -> StepStatus {
        match self {
            Self::Pending => StepStatus::Pending,
            Self::Running => StepStatus::Running,
            Self::Completed => StepStatus::Completed,
            Self::Failed
            | Self::Cancelled
            | Self::Timeout
            | Self::NodeFail
            | Self::OutOfMemory
            | Self::Unknown
            | Self::Error => StepStatus::Failed,
        }
    }

    /// Coarse progress percentage for a transition into this state
    ///
    /// `previous` is the state stored before the transition. A job that fails
    /// after it was seen running keeps the half-way mark.
    pub fn progress(&self, previous: SchedulerStatus) -> u8 {
        match self.step_status() {
            StepStatus::Pending | StepStatus::Skipped => 0,
            StepStatus::Running => 50,
            StepStatus::Completed => 100,
            StepStatus::Failed if previous == Self::Running => 50,
            StepStatus::Failed => 0,
        }
    }

    /// The scheduler's own spelling of this state
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
            Self::Timeout => "TIMEOUT",
            Self::NodeFail => "NODE_FAIL",
            Self::OutOfMemory => "OUT_OF_MEMORY",
            Self::Unknown => "UNKNOWN",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for SchedulerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step status as understood by the control plane
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Pending => write!(f, "pending"),
            StepStatus::Running => write!(f, "running"),
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed => write!(f, "failed"),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}
