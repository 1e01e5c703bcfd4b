// crates/server/src/state.rs
//! Application state for the Axum server.

use std::sync::Arc;
use std::time::Instant;

use tsf_db::Database;

use crate::config::ServerConfig;
use crate::jobs::{ControllerSettings, JobController, JobResult, JobStore};

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Observation store and forecast registry.
    pub db: Database,
    pub config: ServerConfig,
    /// Background forecast jobs. Owns the in-process job registry.
    pub jobs: JobController,
}

impl AppState {
    /// Create a new application state wrapped in an Arc for sharing.
    ///
    /// Opens (creating if needed) the job store under `config.jobs_dir`.
    pub fn new(db: Database, config: ServerConfig) -> JobResult<Arc<Self>> {
        let store = JobStore::open(&config.jobs_dir)?;
        let jobs = JobController::new(
            store,
            Arc::new(db.clone()),
            ControllerSettings {
                stale_after: config.stale_after,
                step_pause: config.step_pause,
            },
        );
        Ok(Arc::new(Self {
            start_time: Instant::now(),
            db,
            config,
            jobs,
        }))
    }

    /// Seconds since the server started.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
