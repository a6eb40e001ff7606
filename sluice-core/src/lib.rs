//! Sluice Core
//!
//! Core types shared by the sluice worker, its HTTP clients and the CLI.
//!
//! This crate contains:
//! - Domain types: scheduler statuses, processing steps, job records
//! - DTOs: payloads exchanged with the control plane and the local worker API

pub mod domain;
pub mod dto;

pub use domain::job::{JobKey, JobRecord};
pub use domain::status::{SchedulerStatus, StepStatus};
pub use domain::step::{Step, UnknownStepError};
