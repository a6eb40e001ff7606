//! Core domain types
//!
//! The fundamental entities of the worker. The batch scheduler is the
//! source of truth for job state; these types are the local view of it.

pub mod job;
pub mod status;
pub mod step;
