//! Data Transfer Objects
//!
//! Payloads exchanged over HTTP:
//! - `pipeline`: worker -> control plane (pipeline creation, step updates, heartbeats)
//! - `worker`: operator/control plane -> local worker service

pub mod pipeline;
pub mod worker;
