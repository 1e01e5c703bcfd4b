// crates/server/src/config.rs
//! Command-line and environment configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

#[derive(Parser, Debug, Clone)]
#[command(name = "tsf")]
#[command(version)]
#[command(about = "Air-quality time-series forecasting service")]
pub struct Cli {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 8000)]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "TSF_HOST", default_value = "127.0.0.1")]
    pub host: IpAddr,

    /// SQLite connection URL (defaults to a file under the user data dir)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Directory holding job records and artifacts
    #[arg(long, env = "TSF_JOBS_DIR")]
    pub jobs_dir: Option<PathBuf>,

    /// Seconds without a heartbeat before a running job is reported paused
    #[arg(long, env = "TSF_STALE_AFTER_SECS", default_value_t = 30)]
    pub stale_after_secs: u64,

    /// Pause between forecast steps, in milliseconds
    #[arg(long, env = "TSF_STEP_PAUSE_MS", default_value_t = 0)]
    pub step_pause_ms: u64,

    /// Allowed CORS origins, comma separated; `*` allows any
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "*", value_delimiter = ',')]
    pub allowed_origins: Vec<String>,

    /// Relaunch orphaned queued/running jobs at startup
    #[arg(long, env = "TSF_RESUME_ORPHANS", default_value_t = false)]
    pub resume_orphans: bool,

    /// Version reported by `/version`
    #[arg(long, env = "APP_VERSION")]
    pub app_version: Option<String>,
}

/// Resolved server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: IpAddr,
    pub port: u16,
    pub database_url: String,
    pub jobs_dir: PathBuf,
    pub stale_after: Duration,
    pub step_pause: Duration,
    pub allowed_origins: Vec<String>,
    pub resume_orphans: bool,
    pub app_version: String,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        let allowed_origins = cli
            .allowed_origins
            .into_iter()
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        Self {
            host: cli.host,
            port: cli.port,
            database_url: cli
                .database_url
                .unwrap_or_else(tsf_core::paths::default_database_url),
            jobs_dir: cli
                .jobs_dir
                .unwrap_or_else(tsf_core::paths::default_jobs_dir),
            stale_after: Duration::from_secs(cli.stale_after_secs),
            step_pause: Duration::from_millis(cli.step_pause_ms),
            allowed_origins,
            resume_orphans: cli.resume_orphans,
            app_version: cli
                .app_version
                .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
        }
    }
}

impl ServerConfig {
    /// Config for tests: in-memory database, jobs under `jobs_dir`.
    pub fn for_tests(jobs_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
            database_url: "sqlite::memory:".to_string(),
            jobs_dir: jobs_dir.into(),
            stale_after: crate::jobs::heartbeat::DEFAULT_STALE_AFTER,
            step_pause: Duration::ZERO,
            allowed_origins: vec!["*".to_string()],
            resume_orphans: false,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether CORS should allow any origin.
    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o == "*")
    }
}
