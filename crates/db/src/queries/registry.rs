//! Forecast registry: one row per completed job artifact.

use serde::Serialize;
use sqlx::Row;
use tsf_core::ArtifactRecord;

use crate::{Database, DbResult};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastEntry {
    pub forecast_id: i64,
    pub forecast_name: String,
    pub target_value: String,
    pub state_name: Option<String>,
    pub result_path: String,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for ForecastEntry {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            forecast_id: row.try_get("forecast_id")?,
            forecast_name: row.try_get("forecast_name")?,
            target_value: row.try_get("target_value")?,
            state_name: row.try_get("state_name")?,
            result_path: row.try_get("result_path")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl Database {
    /// Insert or refresh the registry row for an artifact path.
    pub async fn register_forecast(&self, record: &ArtifactRecord) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO forecast_registry (forecast_name, target_value, state_name, result_path)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(result_path) DO UPDATE SET
                forecast_name = excluded.forecast_name,
                target_value = excluded.target_value,
                state_name = excluded.state_name,
                updated_at = strftime('%Y-%m-%dT%H:%M:%SZ', 'now')
            "#,
        )
        .bind(&record.forecast_name)
        .bind(&record.target_value)
        .bind(&record.state_name)
        .bind(&record.result_path)
        .execute(self.pool())
        .await?;
        Ok(())
    }

    /// All registry rows, newest first.
    pub async fn list_forecasts(&self) -> DbResult<Vec<ForecastEntry>> {
        let rows: Vec<ForecastEntry> = sqlx::query_as(
            r#"
            SELECT forecast_id, forecast_name, target_value, state_name, result_path,
                   created_at, updated_at
            FROM forecast_registry
            ORDER BY updated_at DESC, forecast_id DESC
            "#,
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }
}
