//! Daily aggregate series, and the `SeriesRepository` implementation the
//! forecasting jobs read through.

use async_trait::async_trait;
use chrono::NaiveDate;
use tsf_core::{Aggregation, ArtifactRecord, SeriesFilter, SeriesPoint, SeriesRepository, SeriesSourceError};

use crate::{Database, DbError, DbResult};

impl Database {
    /// Daily `AVG`/`SUM` of `arithmetic_mean` for the selection, ordered by date.
    ///
    /// Uses sqlx::QueryBuilder so optional geographic filters stay bound
    /// parameters.
    pub async fn daily_series(
        &self,
        filter: &SeriesFilter,
        agg: Aggregation,
    ) -> DbResult<Vec<SeriesPoint>> {
        let mut qb = sqlx::QueryBuilder::<sqlx::Sqlite>::new(format!(
            "SELECT date_local, {}(arithmetic_mean) FROM air_quality_raw WHERE parameter_name = ",
            agg.sql_function()
        ));
        qb.push_bind(filter.parameter.as_str());

        let optional = [
            ("state_name", filter.state.as_deref()),
            ("county_name", filter.county.as_deref()),
            ("city_name", filter.city.as_deref()),
            ("cbsa_name", filter.cbsa.as_deref()),
        ];
        for (column, value) in optional {
            if let Some(value) = value {
                qb.push(format!(" AND {column} = "));
                qb.push_bind(value);
            }
        }
        qb.push(" GROUP BY date_local ORDER BY date_local");

        let rows: Vec<(String, f64)> = qb.build_query_as().fetch_all(self.pool()).await?;

        let mut points = Vec::with_capacity(rows.len());
        for (date, value) in rows {
            match NaiveDate::parse_from_str(&date, "%Y-%m-%d") {
                Ok(date) => points.push(SeriesPoint::new(date, value)),
                Err(e) => tracing::warn!(date = %date, error = %e, "skipping row with bad date"),
            }
        }
        Ok(points)
    }
}

impl From<DbError> for SeriesSourceError {
    fn from(e: DbError) -> Self {
        SeriesSourceError::Backend(e.to_string())
    }
}

#[async_trait]
impl SeriesRepository for Database {
    async fn load_daily(
        &self,
        filter: &SeriesFilter,
        agg: Aggregation,
    ) -> Result<Vec<SeriesPoint>, SeriesSourceError> {
        let points = self.daily_series(filter, agg).await?;
        if points.is_empty() {
            return Err(SeriesSourceError::NoData);
        }
        Ok(points)
    }

    async fn record_artifact(&self, record: &ArtifactRecord) -> Result<(), SeriesSourceError> {
        self.register_forecast(record).await?;
        Ok(())
    }
}
