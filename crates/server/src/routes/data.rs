// crates/server/src/routes/data.rs
//! Recent rows and metadata over the stored observations.
//!
//! - GET /data/air_quality/last?limit=
//! - GET /data/air_quality/last_date?state=&parameter=
//! - GET /data/targets
//! - GET /data/filters?target=

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tsf_db::{FilterOptions, ObservationRow};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LastRowsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct LastRowsResponse {
    pub rows: Vec<ObservationRow>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct LastDateQuery {
    pub state: Option<String>,
    pub parameter: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct LastDateResponse {
    pub state: Option<String>,
    pub parameter: Option<String>,
    pub last_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct TargetsResponse {
    pub targets: Vec<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FiltersQuery {
    pub target: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FiltersResponse {
    pub target: Option<String>,
    pub filters: FilterOptions,
}

/// GET /data/air_quality/last - Newest rows first, `limit` in 1..=500.
pub async fn last_rows(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LastRowsQuery>,
) -> ApiResult<Json<LastRowsResponse>> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_LIMIT}, got {limit}"
        )));
    }
    let rows = state.db.latest_observations(limit).await?;
    Ok(Json(LastRowsResponse { rows }))
}

/// GET /data/air_quality/last_date - `last_date` is null when nothing matches.
pub async fn last_date(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LastDateQuery>,
) -> ApiResult<Json<LastDateResponse>> {
    let last_date = state
        .db
        .last_observation_date(query.state.as_deref(), query.parameter.as_deref())
        .await?;
    Ok(Json(LastDateResponse {
        state: query.state,
        parameter: query.parameter,
        last_date,
    }))
}

/// GET /data/targets - Distinct parameter names.
pub async fn targets(State(state): State<Arc<AppState>>) -> ApiResult<Json<TargetsResponse>> {
    let targets = state.db.list_targets().await?;
    Ok(Json(TargetsResponse { targets }))
}

/// GET /data/filters - Distinct geographic values, narrowed to `target` if given.
pub async fn filters(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FiltersQuery>,
) -> ApiResult<Json<FiltersResponse>> {
    let target = query
        .target
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    let filters = state.db.list_filters(target.as_deref()).await?;
    Ok(Json(FiltersResponse { target, filters }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/data/air_quality/last", get(last_rows))
        .route("/data/air_quality/last_date", get(last_date))
        .route("/data/targets", get(targets))
        .route("/data/filters", get(filters))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_helpers::{app, get, seeded_state};
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_last_rows_default_and_limit() {
        let (_dir, state) = seeded_state().await;

        let (status, body) = get(app(&state), "/data/air_quality/last").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["rows"].as_array().unwrap().len(), 50);
        assert_eq!(json["rows"][0]["date_local"], "2024-02-11");

        let (_, body) = get(app(&state), "/data/air_quality/last?limit=2").await;
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["rows"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_last_rows_limit_out_of_range() {
        let (_dir, state) = seeded_state().await;
        let (status, _) = get(app(&state), "/data/air_quality/last?limit=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = get(app(&state), "/data/air_quality/last?limit=501").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_last_date() {
        let (_dir, state) = seeded_state().await;
        let (status, body) =
            get(app(&state), "/data/air_quality/last_date?state=Texas&parameter=NO2").await;
        assert_eq!(status, StatusCode::OK);
        let response: LastDateResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(response.last_date, NaiveDate::from_ymd_opt(2024, 2, 11));

        let (_, body) = get(app(&state), "/data/air_quality/last_date?state=Utah").await;
        let response: LastDateResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(response.last_date, None);
    }

    #[tokio::test]
    async fn test_targets_and_filters() {
        let (_dir, state) = seeded_state().await;
        let (_, body) = get(app(&state), "/data/targets").await;
        let targets: TargetsResponse = serde_json::from_str(&body).unwrap();
        assert_eq!(targets.targets, vec!["NO2".to_string()]);

        let (status, body) = get(app(&state), "/data/filters?target=NO2").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["target"], "NO2");
        assert_eq!(json["filters"]["state_name"], serde_json::json!(["Ohio", "Texas"]));
        assert_eq!(
            json["filters"]["cbsa_name"],
            serde_json::json!(["Dallas MSA", "Houston MSA"])
        );
    }
}
