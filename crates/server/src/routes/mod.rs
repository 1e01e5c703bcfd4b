//! Route handlers for the TSF server.

pub mod aggregate;
pub mod classical;
pub mod data;
pub mod forecast;
pub mod forecasts;
pub mod health;
pub mod metrics;
pub mod upload;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Create the combined router. All routes live at the root.
///
/// Routes:
/// - GET  / - Service descriptor
/// - GET  /health - Liveness, including a database round trip
/// - GET  /version - Configured application version
/// - POST /upload/air_quality - Ingest a raw air-quality CSV
/// - GET  /data/air_quality/last - Newest stored rows
/// - GET  /data/air_quality/last_date - Latest observation date
/// - GET  /data/targets - Distinct parameter names
/// - GET  /data/filters - Geographic filter values for a target
/// - GET  /aggregate/state_daily - Daily mean/sum series
/// - GET  /forecast/state_daily - Quick seasonal-naive or EWMA forecast
/// - GET  /forecast/export/state_daily - The same forecast as CSV
/// - GET  /forecasts - Forecast registry
/// - GET  /forecasts/export - Forecast registry as CSV
/// - POST /classical/start - Start a background SES forecast job
/// - GET  /classical/status - Job progress
/// - POST /classical/resume - Resume a paused or failed job
/// - GET  /classical/download - Finished job artifact
/// - GET  /classical/jobs - Persisted job ids
/// - GET  /metrics - Prometheus metrics
pub fn api_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(health::router())
        .merge(upload::router())
        .merge(data::router())
        .merge(aggregate::router())
        .merge(forecast::router())
        .merge(forecasts::router())
        .merge(classical::router())
        .merge(metrics::router())
        .with_state(state)
}
