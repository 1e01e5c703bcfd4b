// crates/core/src/source.rs
//! Seam between the forecasting jobs and the observation store.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SeriesSourceError;
use crate::types::{Aggregation, SeriesFilter, SeriesPoint};

/// A completed forecast artifact to be listed in the forecast registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Artifact file name, e.g. `NO2_TX_ALL_ALL_ALL_F.csv`.
    pub forecast_name: String,
    pub target_value: String,
    pub state_name: Option<String>,
    pub result_path: String,
}

/// Read daily series and record finished artifacts.
///
/// Implemented by the SQLite store; tests substitute an in-memory fake.
#[async_trait]
pub trait SeriesRepository: Send + Sync {
    /// Daily aggregate of `arithmetic_mean` for the selection, ordered by date.
    /// Days without observations are simply absent.
    async fn load_daily(
        &self,
        filter: &SeriesFilter,
        agg: Aggregation,
    ) -> Result<Vec<SeriesPoint>, SeriesSourceError>;

    /// Upsert a registry entry for a completed artifact.
    async fn record_artifact(&self, record: &ArtifactRecord) -> Result<(), SeriesSourceError>;
}
