// crates/server/src/routes/health.rs
//! Service descriptor, health check and version endpoints.

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

/// Response for `GET /`.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ServiceDescriptor {
    pub service: String,
    pub version: String,
    pub endpoints: Vec<String>,
}

/// Response for the health check endpoint.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct VersionResponse {
    pub version: String,
}

const ENDPOINTS: &[&str] = &[
    "/health",
    "/version",
    "/upload/air_quality",
    "/data/air_quality/last",
    "/data/air_quality/last_date",
    "/data/targets",
    "/data/filters",
    "/aggregate/state_daily",
    "/forecast/state_daily",
    "/forecast/export/state_daily",
    "/forecasts",
    "/forecasts/export",
    "/classical/start",
    "/classical/status",
    "/classical/resume",
    "/classical/download",
    "/classical/jobs",
    "/metrics",
];

/// GET / - What this service is and where to go next.
pub async fn service_descriptor(State(state): State<Arc<AppState>>) -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor {
        service: "tsf".to_string(),
        version: state.config.app_version.clone(),
        endpoints: ENDPOINTS.iter().map(|e| e.to_string()).collect(),
    })
}

/// GET /health - Health check endpoint.
///
/// Runs `SELECT 1` against the store; a failure surfaces as a 500.
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    state.db.ping().await?;
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: state.config.app_version.clone(),
        uptime_secs: state.uptime_secs(),
    }))
}

/// GET /version
pub async fn version(State(state): State<Arc<AppState>>) -> Json<VersionResponse> {
    Json(VersionResponse {
        version: state.config.app_version.clone(),
    })
}

/// Create the health routes router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(service_descriptor))
        .route("/health", get(health_check))
        .route("/version", get(version))
}
