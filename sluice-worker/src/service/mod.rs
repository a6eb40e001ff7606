//! Service layer
//!
//! Business logic of the worker: the notifier that reports to the control
//! plane, the archival collaborator invoked after summary images are
//! produced, and the orchestrator facade that accepts step submissions.

mod archive;
mod notifier;
mod orchestrator;

pub use archive::{Archiver, FsArchiver, image_id};
pub use notifier::Notifier;
pub use orchestrator::{Orchestrator, StartOutcome};
