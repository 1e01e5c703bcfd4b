// crates/server/src/routes/classical.rs
//! Background SES forecast jobs.
//!
//! - POST /classical/start - create and launch a job (202)
//! - GET  /classical/status?job_id= - observed state and progress
//! - POST /classical/resume?job_id= - relaunch a paused, orphaned or failed job (202)
//! - GET  /classical/download?job_id= - the finished CSV artifact
//! - GET  /classical/jobs - persisted job ids

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::jobs::{JobState, JobStatusView, StartRequest};
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct JobIdQuery {
    pub job_id: Option<String>,
}

impl JobIdQuery {
    fn require(self) -> ApiResult<String> {
        self.job_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ApiError::BadRequest("job_id is required".to_string()))
    }
}

/// Body of the 202 returned by start and resume.
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct JobAccepted {
    pub job_id: String,
    pub state: JobState,
}

#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct JobIdsResponse {
    pub job_ids: Vec<String>,
}

/// POST /classical/start
///
/// Parameters come from the JSON body, the query string, or both; body
/// fields win. An empty body is allowed.
pub async fn start(
    State(state): State<Arc<AppState>>,
    Query(query): Query<StartRequest>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let from_body: StartRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?
    };

    let job = state.jobs.start(from_body.or(query)).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id: job.job_id,
            state: job.state,
        }),
    ))
}

/// GET /classical/status?job_id=
pub async fn status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobIdQuery>,
) -> ApiResult<Json<JobStatusView>> {
    let job_id = query.require()?;
    Ok(Json(state.jobs.status(&job_id).await?))
}

/// POST /classical/resume?job_id=
pub async fn resume(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobIdQuery>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = query.require()?;
    let job = state.jobs.resume(&job_id).await?;
    Ok((
        StatusCode::ACCEPTED,
        Json(JobAccepted {
            job_id: job.job_id,
            state: job.state,
        }),
    ))
}

/// GET /classical/download?job_id= - `text/csv` attachment.
pub async fn download(
    State(state): State<Arc<AppState>>,
    Query(query): Query<JobIdQuery>,
) -> ApiResult<Response> {
    let job_id = query.require()?;
    let artifact = state.jobs.download(&job_id).await?;
    let contents = tokio::fs::read(&artifact.path).await.map_err(|e| {
        ApiError::Internal(format!(
            "failed to read artifact {}: {e}",
            artifact.path.display()
        ))
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", artifact.file_name),
            ),
        ],
        contents,
    )
        .into_response())
}

/// GET /classical/jobs
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> ApiResult<Json<JobIdsResponse>> {
    let mut job_ids = state.jobs.list_ids().await?;
    job_ids.sort();
    Ok(Json(JobIdsResponse { job_ids }))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/classical/start", post(start))
        .route("/classical/status", get(status))
        .route("/classical/resume", post(resume))
        .route("/classical/download", get(download))
        .route("/classical/jobs", get(list_jobs))
}
