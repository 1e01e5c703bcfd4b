// crates/server/src/jobs/mod.rs
//! Durable background forecast jobs.
//!
//! Provides:
//! - `JobStore` - one JSON record per job, atomically replaced on every save
//! - `heartbeat` - derives the observed state (`paused`) from heartbeat age
//! - `JobRegistry` - which job ids this process is currently driving
//! - `JobRunner` - the SES-M / SES-Q pipeline for one job, resumable per step
//! - `JobController` - start / status / resume / download orchestration

pub mod controller;
pub mod heartbeat;
pub mod registry;
pub mod runner;
pub mod store;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use controller::{Artifact, ControllerSettings, JobController, ReconcileReport};
pub use registry::{JobRegistry, OwnershipGuard};
pub use runner::JobRunner;
pub use store::JobStore;
pub use types::{Checkpoint, Job, JobParams, JobState, JobStatusView, StartRequest};

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the job subsystem.
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid job parameters: {0}")]
    Validation(String),

    #[error("Forecast failed: {0}")]
    Computation(String),

    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Corrupt job record {}: {message}", path.display())]
    Corrupt { path: PathBuf, message: String },
}

impl JobError {
    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

pub type JobResult<T> = Result<T, JobError>;
