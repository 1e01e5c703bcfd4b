// crates/server/src/jobs/types.rs
//! Job record, parameters and API views.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tsf_core::forecast::{validate_horizon, DEFAULT_HORIZON};
use tsf_core::{Aggregation, ArtifactName, Cadence, SeriesFilter};

use super::{JobError, JobResult};

/// Default `[TYPE]` component of the artifact file name.
pub const DEFAULT_FTYPE: &str = "F";

/// Lifecycle state of a job.
///
/// `Paused` is never written to disk; it is derived from a stale heartbeat
/// by [`super::heartbeat::observed_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Paused,
    Done,
    Error,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Done => "done",
            Self::Error => "error",
        }
    }

    /// Queued or running: a runner is expected to be driving the job.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, immutable job parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobParams {
    pub target_value: String,
    pub state_name: Option<String>,
    pub county_name: Option<String>,
    pub city_name: Option<String>,
    pub cbsa_name: Option<String>,
    pub horizon: usize,
    pub agg: Aggregation,
    pub ftype: String,
}

impl JobParams {
    /// Two sub-phases of `horizon` steps each.
    pub fn total_steps(&self) -> u64 {
        2 * self.horizon as u64
    }

    pub fn series_filter(&self) -> SeriesFilter {
        SeriesFilter {
            parameter: self.target_value.clone(),
            state: self.state_name.clone(),
            county: self.county_name.clone(),
            city: self.city_name.clone(),
            cbsa: self.cbsa_name.clone(),
        }
    }

    pub fn artifact_name(&self) -> ArtifactName<'_> {
        ArtifactName {
            target: &self.target_value,
            state: self.state_name.as_deref(),
            county: self.county_name.as_deref(),
            city: self.city_name.as_deref(),
            cbsa: self.cbsa_name.as_deref(),
            ftype: &self.ftype,
        }
    }
}

/// Per-step forecast values already computed, in horizon order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub ses_m: Vec<f64>,
    pub ses_q: Vec<f64>,
}

impl Checkpoint {
    pub fn values(&self, cadence: Cadence) -> &[f64] {
        match cadence {
            Cadence::Monthly => &self.ses_m,
            Cadence::Quarterly => &self.ses_q,
        }
    }

    pub fn values_mut(&mut self, cadence: Cadence) -> &mut Vec<f64> {
        match cadence {
            Cadence::Monthly => &mut self.ses_m,
            Cadence::Quarterly => &mut self.ses_q,
        }
    }
}

/// The durable job record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub job_id: String,
    pub state: JobState,
    pub message: String,
    pub done: u64,
    pub total: u64,
    pub last_heartbeat: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub params: JobParams,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub checkpoint: Checkpoint,
    /// Last observed date the horizon hangs off. Fixed by the first runner;
    /// later runners ignore observations after it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_observed: Option<NaiveDate>,
}

impl Job {
    pub fn new(job_id: impl Into<String>, params: JobParams, now: DateTime<Utc>) -> Self {
        Self {
            job_id: job_id.into(),
            state: JobState::Queued,
            message: "queued".to_string(),
            done: 0,
            total: params.total_steps(),
            last_heartbeat: now,
            created_at: now,
            params,
            result_path: None,
            error_detail: None,
            attempts: 0,
            checkpoint: Checkpoint::default(),
            last_observed: None,
        }
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }

    /// Move the heartbeat forward. Never moves it back.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_heartbeat {
            self.last_heartbeat = now;
        }
    }

    /// Raise `done` to `value`, capped at `total`. Never lowers it.
    pub fn advance_to(&mut self, value: u64) {
        self.done = self.done.max(value.min(self.total));
    }
}

/// Raw start request. Accepts the field aliases older clients send; every
/// field is optional until [`StartRequest::into_params`] validates it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StartRequest {
    #[serde(alias = "parameter", alias = "target")]
    pub target_value: Option<String>,
    pub state_name: Option<String>,
    pub state: Option<String>,
    #[serde(alias = "county")]
    pub county_name: Option<String>,
    #[serde(alias = "city")]
    pub city_name: Option<String>,
    #[serde(alias = "cbsa")]
    pub cbsa_name: Option<String>,
    #[serde(alias = "h")]
    pub horizon: Option<usize>,
    pub agg: Option<String>,
    #[serde(alias = "type")]
    pub ftype: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

impl StartRequest {
    /// Fill fields missing here from `fallback` (used for body-over-query).
    pub fn or(self, fallback: StartRequest) -> StartRequest {
        StartRequest {
            target_value: self.target_value.or(fallback.target_value),
            state_name: self.state_name.or(fallback.state_name),
            state: self.state.or(fallback.state),
            county_name: self.county_name.or(fallback.county_name),
            city_name: self.city_name.or(fallback.city_name),
            cbsa_name: self.cbsa_name.or(fallback.cbsa_name),
            horizon: self.horizon.or(fallback.horizon),
            agg: self.agg.or(fallback.agg),
            ftype: self.ftype.or(fallback.ftype),
        }
    }

    /// Validate and coalesce into immutable [`JobParams`].
    pub fn into_params(self) -> JobResult<JobParams> {
        let target_value = non_blank(self.target_value)
            .ok_or_else(|| JobError::Validation("target_value is required".to_string()))?;

        let horizon = validate_horizon(self.horizon.unwrap_or(DEFAULT_HORIZON))
            .map_err(|e| JobError::Validation(e.to_string()))?;

        let agg = match non_blank(self.agg) {
            Some(raw) => raw.parse::<Aggregation>().map_err(JobError::Validation)?,
            None => Aggregation::default(),
        };

        Ok(JobParams {
            target_value,
            state_name: non_blank(self.state_name).or_else(|| non_blank(self.state)),
            county_name: non_blank(self.county_name),
            city_name: non_blank(self.city_name),
            cbsa_name: non_blank(self.cbsa_name),
            horizon,
            agg,
            ftype: non_blank(self.ftype).unwrap_or_else(|| DEFAULT_FTYPE.to_string()),
        })
    }
}

/// What `GET /classical/status` returns.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(test, derive(Deserialize))]
pub struct JobStatusView {
    pub job_id: String,
    pub state: JobState,
    pub message: String,
    pub percent: f64,
    pub done: u64,
    pub total: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub heartbeat_age_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn request(json: &str) -> StartRequest {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_into_params_defaults() {
        let params = request(r#"{"target_value": "NO2"}"#).into_params().unwrap();
        assert_eq!(params.horizon, 30);
        assert_eq!(params.agg, Aggregation::Mean);
        assert_eq!(params.ftype, "F");
        assert_eq!(params.state_name, None);
        assert_eq!(params.total_steps(), 60);
    }

    #[test]
    fn test_into_params_aliases_and_coalescing() {
        let params = request(
            r#"{"parameter": " NO2 ", "state": "TX", "county": "", "h": 10, "type": "Q", "agg": "SUM"}"#,
        )
        .into_params()
        .unwrap();
        assert_eq!(params.target_value, "NO2");
        assert_eq!(params.state_name.as_deref(), Some("TX"));
        assert_eq!(params.county_name, None);
        assert_eq!(params.horizon, 10);
        assert_eq!(params.ftype, "Q");
        assert_eq!(params.agg, Aggregation::Sum);
    }

    #[test]
    fn test_state_name_wins_over_state() {
        let params = request(r#"{"target": "NO2", "state_name": "Texas", "state": "TX"}"#)
            .into_params()
            .unwrap();
        assert_eq!(params.state_name.as_deref(), Some("Texas"));

        let params = request(r#"{"target": "NO2", "state_name": "  ", "state": "TX"}"#)
            .into_params()
            .unwrap();
        assert_eq!(params.state_name.as_deref(), Some("TX"));
    }

    #[test]
    fn test_into_params_validation() {
        assert!(matches!(
            request(r#"{"state": "TX"}"#).into_params(),
            Err(JobError::Validation(_))
        ));
        assert!(matches!(
            request(r#"{"target_value": "NO2", "horizon": 0}"#).into_params(),
            Err(JobError::Validation(_))
        ));
        assert!(matches!(
            request(r#"{"target_value": "NO2", "horizon": 400}"#).into_params(),
            Err(JobError::Validation(_))
        ));
        assert!(matches!(
            request(r#"{"target_value": "NO2", "agg": "median"}"#).into_params(),
            Err(JobError::Validation(_))
        ));
    }

    #[test]
    fn test_body_overrides_query() {
        let body = request(r#"{"target_value": "NO2", "h": 5}"#);
        let query = request(r#"{"target_value": "Ozone", "state": "TX", "h": 9}"#);
        let params = body.or(query).into_params().unwrap();
        assert_eq!(params.target_value, "NO2");
        assert_eq!(params.horizon, 5);
        assert_eq!(params.state_name.as_deref(), Some("TX"));
    }

    #[test]
    fn test_job_progress_helpers() {
        let params = request(r#"{"target_value": "NO2", "h": 10}"#).into_params().unwrap();
        let t0 = Utc::now();
        let mut job = Job::new("abc", params, t0);
        assert_eq!(job.state, JobState::Queued);
        assert_eq!((job.done, job.total), (0, 20));
        assert_eq!(job.percent(), 0.0);

        job.advance_to(5);
        job.advance_to(3);
        assert_eq!(job.done, 5);
        job.advance_to(99);
        assert_eq!(job.done, 20);
        assert_eq!(job.percent(), 100.0);

        job.touch(t0 - chrono::Duration::seconds(10));
        assert_eq!(job.last_heartbeat, t0);
    }

    #[test]
    fn test_job_roundtrips_json_and_omits_empty_fields() {
        let params = request(r#"{"target_value": "NO2"}"#).into_params().unwrap();
        let job = Job::new("abc", params, Utc::now());
        let json = serde_json::to_string(&job).unwrap();
        assert!(json.contains("\"state\":\"queued\""));
        assert!(!json.contains("result_path"));
        assert!(!json.contains("error_detail"));
        let back: Job = serde_json::from_str(&json).unwrap();
        assert_eq!(back, job);
    }
}
