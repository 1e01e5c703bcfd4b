//! Default storage locations for the service.
//!
//! Every path here is only a default; the server binary lets each one be
//! overridden from the command line or environment.

use std::path::PathBuf;

/// App data root: `~/Library/Application Support/tsf/` (macOS) or `~/.local/share/tsf/` (Linux).
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("tsf"))
}

/// SQLite database file: `<app_data_dir>/tsf.db`.
pub fn db_path() -> Option<PathBuf> {
    app_data_dir().map(|d| d.join("tsf.db"))
}

/// Default `sqlite:` connection URL, falling back to the working directory
/// when no data dir can be resolved.
pub fn default_database_url() -> String {
    let path = db_path().unwrap_or_else(|| PathBuf::from("tsf.db"));
    format!("sqlite://{}?mode=rwc", path.display())
}

/// Durable job records live here: `<temp_dir>/tsf_jobs/`.
pub fn default_jobs_dir() -> PathBuf {
    std::env::temp_dir().join("tsf_jobs")
}
