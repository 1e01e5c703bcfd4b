// crates/server/src/routes/forecast.rs
//! Quick synchronous forecasts over a state's daily series.
//!
//! - GET /forecast/state_daily - JSON history + forecast
//! - GET /forecast/export/state_daily - CSV `DATE,VALUE,FORECAST_VALUE`

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tsf_core::forecast::{
    ewma, naive::DEFAULT_LOOKBACK_WEEKS, seasonal_naive_dow, validate_horizon, DEFAULT_HORIZON,
};
use tsf_core::{format_value, sanitize_component, Aggregation, ForecastMethod, SeriesPoint};

use super::aggregate::{load_state_daily, StateDailyQuery};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ForecastResponse {
    pub state: String,
    pub parameter: String,
    pub agg: Aggregation,
    pub method: ForecastMethod,
    pub h: usize,
    pub history: Vec<SeriesPoint>,
    pub forecast: Vec<SeriesPoint>,
}

struct QuickForecast {
    state: String,
    parameter: String,
    agg: Aggregation,
    method: ForecastMethod,
    h: usize,
    history: Vec<SeriesPoint>,
    forecast: Vec<SeriesPoint>,
}

async fn run_quick_forecast(state: &AppState, query: &StateDailyQuery) -> ApiResult<QuickForecast> {
    let h = validate_horizon(query.h.unwrap_or(DEFAULT_HORIZON))?;
    let method = match query.method.as_deref().map(str::trim) {
        None | Some("") => ForecastMethod::default(),
        Some(raw) => raw.parse().map_err(ApiError::BadRequest)?,
    };
    let (state_name, parameter, agg, history) = load_state_daily(state, query).await?;

    let forecast = match method {
        ForecastMethod::SeasonalNaiveDow => {
            seasonal_naive_dow(&history, h, DEFAULT_LOOKBACK_WEEKS)?
        }
        ForecastMethod::Ewma => ewma(&history, h, tsf_core::forecast::ewma::DEFAULT_SPAN)?,
    };

    Ok(QuickForecast {
        state: state_name,
        parameter,
        agg,
        method,
        h,
        history,
        forecast,
    })
}

/// GET /forecast/state_daily?state=&parameter=&h=&agg=&method=
pub async fn forecast_state_daily(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StateDailyQuery>,
) -> ApiResult<Json<ForecastResponse>> {
    let fc = run_quick_forecast(&state, &query).await?;
    Ok(Json(ForecastResponse {
        state: fc.state,
        parameter: fc.parameter,
        agg: fc.agg,
        method: fc.method,
        h: fc.h,
        history: fc.history,
        forecast: fc.forecast,
    }))
}

/// History rows carry `VALUE`, forecast rows carry `FORECAST_VALUE`.
fn build_export_csv(history: &[SeriesPoint], forecast: &[SeriesPoint]) -> String {
    let mut csv = String::from("DATE,VALUE,FORECAST_VALUE\n");
    for p in history {
        csv.push_str(&format!("{},{},\n", p.date.format("%Y-%m-%d"), format_value(Some(p.value))));
    }
    for p in forecast {
        csv.push_str(&format!("{},,{}\n", p.date.format("%Y-%m-%d"), format_value(Some(p.value))));
    }
    csv
}

/// GET /forecast/export/state_daily - Same query, CSV attachment.
pub async fn export_state_daily(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StateDailyQuery>,
) -> ApiResult<Response> {
    let fc = run_quick_forecast(&state, &query).await?;
    let csv = build_export_csv(&fc.history, &fc.forecast);

    let file_name = format!(
        "tsf-air_quality-{}-{}-{}-{}-{}.csv",
        sanitize_component(Some(&fc.state)),
        sanitize_component(Some(&fc.parameter)),
        fc.agg,
        fc.method,
        chrono::Local::now().format("%Y%m%d"),
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{file_name}\""),
            ),
        ],
        csv,
    )
        .into_response())
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/forecast/state_daily", get(forecast_state_daily))
        .route("/forecast/export/state_daily", get(export_state_daily))
}
