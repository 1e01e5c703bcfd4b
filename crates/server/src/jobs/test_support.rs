// crates/server/src/jobs/test_support.rs
//! Fixtures shared by the job tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::NaiveDate;
use tsf_core::{
    Aggregation, ArtifactRecord, SeriesFilter, SeriesPoint, SeriesRepository, SeriesSourceError,
};

use super::types::{JobParams, StartRequest};

/// NO2 / TX params with the given horizon.
pub fn params(horizon: usize) -> JobParams {
    StartRequest {
        target_value: Some("NO2".to_string()),
        state: Some("TX".to_string()),
        horizon: Some(horizon),
        ..Default::default()
    }
    .into_params()
    .unwrap()
}

/// `days` consecutive daily points from 2024-01-01 with a gentle trend.
pub fn daily_series(days: u32) -> Vec<SeriesPoint> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    (0..days)
        .map(|i| {
            let date = start + chrono::Duration::days(i64::from(i));
            SeriesPoint::new(date, 10.0 + f64::from(i) * 0.05 + f64::from(i % 7))
        })
        .collect()
}

/// In-memory series source that serves a fixed series and records artifacts.
#[derive(Debug, Default)]
pub struct FakeRepository {
    pub points: Vec<SeriesPoint>,
    pub recorded: Mutex<Vec<ArtifactRecord>>,
}

impl FakeRepository {
    pub fn with_points(points: Vec<SeriesPoint>) -> Self {
        Self {
            points,
            recorded: Mutex::new(Vec::new()),
        }
    }

    pub fn recorded(&self) -> Vec<ArtifactRecord> {
        self.recorded.lock().unwrap().clone()
    }
}

#[async_trait]
impl SeriesRepository for FakeRepository {
    async fn load_daily(
        &self,
        _filter: &SeriesFilter,
        _agg: Aggregation,
    ) -> Result<Vec<SeriesPoint>, SeriesSourceError> {
        if self.points.is_empty() {
            return Err(SeriesSourceError::NoData);
        }
        Ok(self.points.clone())
    }

    async fn record_artifact(&self, record: &ArtifactRecord) -> Result<(), SeriesSourceError> {
        self.recorded.lock().unwrap().push(record.clone());
        Ok(())
    }
}
