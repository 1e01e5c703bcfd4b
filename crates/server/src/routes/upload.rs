// crates/server/src/routes/upload.rs
//! Raw air-quality CSV upload.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Query, State},
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tsf_db::OnConflict;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Uploads are whole CSV files; axum's 2 MB default is too small.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct UploadQuery {
    /// `ignore` (default) or `fail`
    pub on_conflict: Option<String>,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct UploadResponse {
    pub rows_inserted: u64,
    pub rows_skipped: u64,
    pub rows_duplicate: u64,
}

/// POST /upload/air_quality?on_conflict=ignore|fail
///
/// The body is the raw CSV. Rows with an unparseable date or mean are
/// skipped and counted. With `fail`, the first duplicate aborts the whole
/// upload with 409 and nothing is written.
pub async fn upload_air_quality(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UploadQuery>,
    body: String,
) -> ApiResult<Json<UploadResponse>> {
    let policy = match query.on_conflict.as_deref() {
        Some(raw) if !raw.trim().is_empty() => raw.parse::<OnConflict>().map_err(ApiError::BadRequest)?,
        _ => OnConflict::default(),
    };

    let report = tsf_core::parse_observations(&body)?;
    let summary = state
        .db
        .insert_observations(&report.observations, policy)
        .await?;

    crate::metrics::record_ingest(summary.inserted, summary.duplicates, report.skipped as u64);
    tracing::info!(
        inserted = summary.inserted,
        duplicates = summary.duplicates,
        skipped = report.skipped,
        "air-quality CSV ingested"
    );

    Ok(Json(UploadResponse {
        rows_inserted: summary.inserted,
        rows_skipped: report.skipped as u64,
        rows_duplicate: summary.duplicates,
    }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/upload/air_quality", post(upload_air_quality))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
}
