// crates/server/src/error.rs
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tsf_core::{ForecastError, IngestError};
use tsf_db::DbError;

use crate::jobs::JobError;

/// Structured JSON error response for API errors
#[derive(Debug, Serialize)]
#[cfg_attr(test, derive(serde::Deserialize))]
pub struct ErrorResponse {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}

/// API error types that map to HTTP status codes
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Database error: {0}")]
    Database(#[from] DbError),

    #[error("Unprocessable: {0}")]
    Unprocessable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),
}

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<ForecastError> for ApiError {
    fn from(e: ForecastError) -> Self {
        match e {
            ForecastError::InvalidHorizon { .. } => ApiError::BadRequest(e.to_string()),
            other => ApiError::Unprocessable(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            ApiError::NotFound(what) => {
                tracing::warn!(what = %what, "Not found");
                (
                    StatusCode::NOT_FOUND,
                    ErrorResponse::with_details("Not found", what.clone()),
                )
            }
            ApiError::Job(job_err) => match job_err {
                JobError::NotFound(id) => {
                    tracing::warn!(job_id = %id, "Job not found");
                    (
                        StatusCode::NOT_FOUND,
                        ErrorResponse::with_details("Job not found", job_err.to_string()),
                    )
                }
                JobError::Conflict(msg) => {
                    tracing::warn!(message = %msg, "Job conflict");
                    (
                        StatusCode::CONFLICT,
                        ErrorResponse::with_details("Conflict", msg.clone()),
                    )
                }
                JobError::Validation(msg) => {
                    tracing::warn!(message = %msg, "Invalid job parameters");
                    (
                        StatusCode::BAD_REQUEST,
                        ErrorResponse::with_details("Bad request", msg.clone()),
                    )
                }
                JobError::Computation(msg) => {
                    tracing::warn!(message = %msg, "Forecast computation failed");
                    (
                        StatusCode::UNPROCESSABLE_ENTITY,
                        ErrorResponse::with_details("Forecast failed", msg.clone()),
                    )
                }
                JobError::Storage { path, source } => {
                    tracing::error!(path = %path.display(), error = %source, "Job storage error");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("Job storage error"),
                    )
                }
                JobError::Corrupt { path, message } => {
                    tracing::error!(path = %path.display(), message = %message, "Corrupt job record");
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        ErrorResponse::new("Corrupt job record"),
                    )
                }
            },
            ApiError::Database(DbError::Conflict(msg)) => {
                tracing::warn!(message = %msg, "Duplicate row rejected");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Duplicate row", msg.clone()),
                )
            }
            ApiError::Database(db_err) => {
                tracing::error!(error = %db_err, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Database error"),
                )
            }
            ApiError::Unprocessable(msg) => {
                tracing::warn!(message = %msg, "Unprocessable request");
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorResponse::with_details("Unprocessable", msg.clone()),
                )
            }
            ApiError::Internal(msg) => {
                tracing::error!(message = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::new("Internal server error"),
                )
            }
            ApiError::BadRequest(msg) => {
                tracing::warn!(message = %msg, "Bad request");
                (
                    StatusCode::BAD_REQUEST,
                    ErrorResponse::with_details("Bad request", msg.clone()),
                )
            }
            ApiError::Conflict(msg) => {
                tracing::warn!(message = %msg, "Conflict");
                (
                    StatusCode::CONFLICT,
                    ErrorResponse::with_details("Conflict", msg.clone()),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

/// Result type alias for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use std::path::PathBuf;

    /// Helper to extract status code and body from a response
    async fn extract_response(response: Response) -> (StatusCode, ErrorResponse) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let error_response: ErrorResponse = serde_json::from_slice(&body).unwrap();
        (status, error_response)
    }

    #[tokio::test]
    async fn test_job_not_found_returns_404() {
        let error = ApiError::from(JobError::NotFound("abc123".to_string()));
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "Job not found");
        assert!(body.details.unwrap().contains("abc123"));
    }

    #[tokio::test]
    async fn test_job_conflict_returns_409() {
        let error = ApiError::from(JobError::Conflict("job x is already done".to_string()));
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.details.as_deref(), Some("job x is already done"));
    }

    #[tokio::test]
    async fn test_job_validation_returns_400() {
        let error = ApiError::from(JobError::Validation("target_value is required".into()));
        let (status, _) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_job_computation_returns_422() {
        let error = ApiError::from(JobError::Computation("no data".into()));
        let (status, body) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body.error, "Forecast failed");
    }

    #[tokio::test]
    async fn test_job_storage_hides_details() {
        let error = ApiError::from(JobError::Storage {
            path: PathBuf::from("/var/lib/tsf/jobs/abc.json"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        });
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn test_db_conflict_returns_409() {
        let error = ApiError::from(DbError::Conflict("2024-01-01 NO2 TX".into()));
        let (status, body) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body.error, "Duplicate row");
    }

    #[tokio::test]
    async fn test_db_error_returns_500() {
        let error = ApiError::from(DbError::NoDataDir);
        let (status, body) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.details.is_none());
    }

    #[tokio::test]
    async fn test_forecast_errors_map_by_kind() {
        let error = ApiError::from(ForecastError::InvalidHorizon { got: 0, max: 365 });
        let (status, _) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let error = ApiError::from(ForecastError::EmptySeries);
        let (status, _) = extract_response(error.into_response()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn test_internal_error_returns_500() {
        let error = ApiError::Internal("Something went wrong".to_string());
        let (status, body) = extract_response(error.into_response()).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Internal server error");
        // Internal errors should NOT expose details to clients
        assert!(body.details.is_none());
    }

    #[test]
    fn test_error_response_serialization() {
        let response = ErrorResponse::new("Test error");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"error\":\"Test error\""));
        assert!(!json.contains("details")); // None should be skipped

        let response = ErrorResponse::with_details("Test error", "More info");
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"details\":\"More info\""));
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError::NotFound("forecast".to_string());
        assert_eq!(err.to_string(), "Not found: forecast");

        let err = ApiError::Internal("oops".to_string());
        assert_eq!(err.to_string(), "Internal server error: oops");
    }
}
