// crates/server/src/routes/aggregate.rs
//! Daily aggregate series for one state and parameter.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tsf_core::{Aggregation, SeriesFilter, SeriesPoint};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Query shared by the `state_daily` aggregate, forecast and export routes.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct StateDailyQuery {
    pub state: Option<String>,
    pub parameter: Option<String>,
    pub agg: Option<String>,
    pub h: Option<usize>,
    pub method: Option<String>,
}

fn required(value: &Option<String>, name: &str) -> ApiResult<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::BadRequest(format!("{name} is required")))
}

impl StateDailyQuery {
    pub fn state(&self) -> ApiResult<String> {
        required(&self.state, "state")
    }

    pub fn parameter(&self) -> ApiResult<String> {
        required(&self.parameter, "parameter")
    }

    pub fn aggregation(&self) -> ApiResult<Aggregation> {
        match self.agg.as_deref().map(str::trim) {
            None | Some("") => Ok(Aggregation::default()),
            Some(raw) => raw.parse().map_err(ApiError::BadRequest),
        }
    }
}

/// Load the daily series for a validated query. Empty selections are 404.
pub(crate) async fn load_state_daily(
    state: &AppState,
    query: &StateDailyQuery,
) -> ApiResult<(String, String, Aggregation, Vec<SeriesPoint>)> {
    let state_name = query.state()?;
    let parameter = query.parameter()?;
    let agg = query.aggregation()?;

    let filter = SeriesFilter::for_parameter(parameter.clone()).with_state(state_name.clone());
    let series = state.db.daily_series(&filter, agg).await?;
    if series.is_empty() {
        return Err(ApiError::NotFound(format!(
            "no data for state '{state_name}' and parameter '{parameter}'"
        )));
    }
    Ok((state_name, parameter, agg, series))
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct StateDailyResponse {
    pub state: String,
    pub parameter: String,
    pub agg: Aggregation,
    pub series: Vec<SeriesPoint>,
}

/// GET /aggregate/state_daily?state=&parameter=&agg=mean|sum
pub async fn state_daily(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StateDailyQuery>,
) -> ApiResult<Json<StateDailyResponse>> {
    let (state_name, parameter, agg, series) = load_state_daily(&state, &query).await?;
    Ok(Json(StateDailyResponse {
        state: state_name,
        parameter,
        agg,
        series,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/aggregate/state_daily", get(state_daily))
}
