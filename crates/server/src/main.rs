// crates/server/src/main.rs
//! TSF server binary.
//!
//! Opens the store, reconciles persisted jobs left behind by a previous
//! process, then serves HTTP until SIGINT/SIGTERM.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use tsf_db::Database;
use tsf_server::{create_app, init_metrics, AppState, Cli, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "info,tsf_server=info".into()),
        )
        .compact()
        .init();

    let config = ServerConfig::from(Cli::parse());

    init_metrics();

    let db = Database::connect(&config.database_url)
        .await
        .with_context(|| format!("opening database {}", config.database_url))?;

    let resume_orphans = config.resume_orphans;
    let addr = config.addr();
    let state = AppState::new(db, config).context("opening job store")?;

    match state.jobs.reconcile(resume_orphans).await {
        Ok(report) if !report.orphans.is_empty() && !resume_orphans => {
            tracing::warn!(
                orphans = ?report.orphans,
                "found unowned queued/running jobs; resume them via /classical/resume or start with --resume-orphans"
            );
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "job store reconciliation failed (non-fatal)"),
    }

    let app = create_app(state.clone());
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    tracing::info!(
        %addr,
        version = %state.config.app_version,
        jobs_dir = %state.config.jobs_dir.display(),
        "tsf server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, initiating graceful shutdown"),
        _ = terminate => tracing::info!("Received SIGTERM, initiating graceful shutdown"),
    }
}
