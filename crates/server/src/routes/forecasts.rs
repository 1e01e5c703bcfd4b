// crates/server/src/routes/forecasts.rs
//! Forecast registry listing and CSV export.

use std::sync::Arc;

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tsf_core::escape_csv_field;
use tsf_db::ForecastEntry;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ForecastsResponse {
    pub total_count: usize,
    pub forecasts: Vec<ForecastEntry>,
}

/// GET /forecasts - Registered job artifacts, newest first.
pub async fn list_forecasts(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Json<ForecastsResponse>> {
    let forecasts = state.db.list_forecasts().await?;
    Ok(Json(ForecastsResponse {
        total_count: forecasts.len(),
        forecasts,
    }))
}

/// Build RFC 4180 CSV for the registry.
fn build_csv(entries: &[ForecastEntry]) -> String {
    let mut csv = String::from(
        "forecast_id,forecast_name,target_value,state_name,result_path,created_at,updated_at\n",
    );
    for e in entries {
        csv.push_str(&format!(
            "{},{},{},{},{},{},{}\n",
            e.forecast_id,
            escape_csv_field(&e.forecast_name),
            escape_csv_field(&e.target_value),
            escape_csv_field(e.state_name.as_deref().unwrap_or("")),
            escape_csv_field(&e.result_path),
            escape_csv_field(&e.created_at),
            escape_csv_field(&e.updated_at),
        ));
    }
    csv
}

/// GET /forecasts/export - The registry as a CSV attachment.
pub async fn export_forecasts(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let entries = state.db.list_forecasts().await?;
    let csv = build_csv(&entries);
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"forecasts.csv\"",
            ),
        ],
        csv,
    )
        .into_response())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/forecasts", get(list_forecasts))
        .route("/forecasts/export", get(export_forecasts))
}
