//! Raw observation ingest and lookup queries.

use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use tsf_core::Observation;

use crate::{Database, DbError, DbResult};

/// What to do when an uploaded row matches an existing natural key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnConflict {
    /// Skip the duplicate and keep going.
    #[default]
    Ignore,
    /// Abort the whole upload; nothing is written.
    Fail,
}

impl FromStr for OnConflict {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "fail" => Ok(Self::Fail),
            other => Err(format!("on_conflict must be 'ignore' or 'fail', got '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertSummary {
    pub inserted: u64,
    pub duplicates: u64,
}

/// A stored observation as returned by the recent-rows endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationRow {
    pub id: i64,
    pub date_local: String,
    pub parameter_name: String,
    pub arithmetic_mean: f64,
    pub local_site_name: Option<String>,
    pub state_name: String,
    pub county_name: Option<String>,
    pub city_name: Option<String>,
    pub cbsa_name: Option<String>,
    pub created_at: String,
}

impl<'r> sqlx::FromRow<'r, sqlx::sqlite::SqliteRow> for ObservationRow {
    fn from_row(row: &'r sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            date_local: row.try_get("date_local")?,
            parameter_name: row.try_get("parameter_name")?,
            arithmetic_mean: row.try_get("arithmetic_mean")?,
            local_site_name: row.try_get("local_site_name")?,
            state_name: row.try_get("state_name")?,
            county_name: row.try_get("county_name")?,
            city_name: row.try_get("city_name")?,
            cbsa_name: row.try_get("cbsa_name")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// Distinct geographic values available for a target.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    pub state_name: Vec<String>,
    pub county_name: Vec<String>,
    pub city_name: Vec<String>,
    pub cbsa_name: Vec<String>,
}

impl Database {
    /// Insert parsed observations in one transaction.
    ///
    /// With [`OnConflict::Ignore`] rows colliding on the natural key are
    /// counted as duplicates. With [`OnConflict::Fail`] the first collision
    /// rolls back the transaction and returns [`DbError::Conflict`].
    pub async fn insert_observations(
        &self,
        rows: &[Observation],
        on_conflict: OnConflict,
    ) -> DbResult<InsertSummary> {
        let mut summary = InsertSummary::default();
        if rows.is_empty() {
            return Ok(summary);
        }

        let sql = match on_conflict {
            OnConflict::Ignore => {
                r#"
                INSERT OR IGNORE INTO air_quality_raw
                    (date_local, parameter_name, arithmetic_mean, local_site_name,
                     state_name, county_name, city_name, cbsa_name)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#
            }
            OnConflict::Fail => {
                r#"
                INSERT INTO air_quality_raw
                    (date_local, parameter_name, arithmetic_mean, local_site_name,
                     state_name, county_name, city_name, cbsa_name)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#
            }
        };

        let mut tx = self.pool().begin().await?;
        for row in rows {
            let result = sqlx::query(sql)
                .bind(row.date_local.format("%Y-%m-%d").to_string())
                .bind(&row.parameter_name)
                .bind(row.arithmetic_mean)
                .bind(&row.local_site_name)
                .bind(&row.state_name)
                .bind(&row.county_name)
                .bind(&row.city_name)
                .bind(&row.cbsa_name)
                .execute(&mut *tx)
                .await;

            match result {
                Ok(done) if done.rows_affected() == 0 => summary.duplicates += 1,
                Ok(_) => summary.inserted += 1,
                Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                    tx.rollback().await?;
                    return Err(DbError::Conflict(format!(
                        "{} / {} / {} on {} already exists",
                        row.parameter_name,
                        row.state_name,
                        row.local_site_name.as_deref().unwrap_or("-"),
                        row.date_local
                    )));
                }
                Err(e) => return Err(e.into()),
            }
        }
        tx.commit().await?;

        Ok(summary)
    }

    /// Most recently dated observations, newest first.
    pub async fn latest_observations(&self, limit: i64) -> DbResult<Vec<ObservationRow>> {
        let rows: Vec<ObservationRow> = sqlx::query_as(
            r#"
            SELECT id, date_local, parameter_name, arithmetic_mean, local_site_name,
                   state_name, county_name, city_name, cbsa_name, created_at
            FROM air_quality_raw
            ORDER BY date_local DESC, id DESC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool())
        .await?;
        Ok(rows)
    }

    /// Latest observation date, optionally narrowed by state and parameter.
    pub async fn last_observation_date(
        &self,
        state: Option<&str>,
        parameter: Option<&str>,
    ) -> DbResult<Option<NaiveDate>> {
        let row: (Option<String>,) = sqlx::query_as(
            r#"
            SELECT MAX(date_local) FROM air_quality_raw
            WHERE (?1 IS NULL OR state_name = ?1)
              AND (?2 IS NULL OR parameter_name = ?2)
            "#,
        )
        .bind(state)
        .bind(parameter)
        .fetch_one(self.pool())
        .await?;

        Ok(row
            .0
            .and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
    }

    /// Distinct parameter names, sorted.
    pub async fn list_targets(&self) -> DbResult<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT parameter_name FROM air_quality_raw ORDER BY parameter_name",
        )
        .fetch_all(self.pool())
        .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }

    /// Distinct non-null geographic values, optionally for one target.
    pub async fn list_filters(&self, target: Option<&str>) -> DbResult<FilterOptions> {
        Ok(FilterOptions {
            state_name: self.distinct_column("state_name", target).await?,
            county_name: self.distinct_column("county_name", target).await?,
            city_name: self.distinct_column("city_name", target).await?,
            cbsa_name: self.distinct_column("cbsa_name", target).await?,
        })
    }

    // `column` is always one of the fixed names above, never user input.
    async fn distinct_column(&self, column: &str, target: Option<&str>) -> DbResult<Vec<String>> {
        let sql = format!(
            "SELECT DISTINCT {column} FROM air_quality_raw \
             WHERE {column} IS NOT NULL AND {column} != '' \
               AND (?1 IS NULL OR parameter_name = ?1) \
             ORDER BY {column}"
        );
        let rows: Vec<(String,)> = sqlx::query_as(&sql)
            .bind(target)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(s,)| s).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn obs(date: &str, parameter: &str, state: &str, county: Option<&str>, value: f64) -> Observation {
        Observation {
            date_local: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            parameter_name: parameter.to_string(),
            arithmetic_mean: value,
            local_site_name: Some("Site 1".to_string()),
            state_name: state.to_string(),
            county_name: county.map(str::to_string),
            city_name: None,
            cbsa_name: None,
        }
    }

    #[tokio::test]
    async fn test_insert_ignore_counts_duplicates() {
        let db = Database::new_in_memory().await.unwrap();
        let rows = vec![
            obs("2024-01-01", "NO2", "Texas", None, 1.0),
            obs("2024-01-02", "NO2", "Texas", None, 2.0),
        ];
        let first = db.insert_observations(&rows, OnConflict::Ignore).await.unwrap();
        assert_eq!(first, InsertSummary { inserted: 2, duplicates: 0 });

        // Same natural key, NULL county included
        let second = db.insert_observations(&rows, OnConflict::Ignore).await.unwrap();
        assert_eq!(second, InsertSummary { inserted: 0, duplicates: 2 });
    }

    #[tokio::test]
    async fn test_insert_fail_rolls_back() {
        let db = Database::new_in_memory().await.unwrap();
        db.insert_observations(&[obs("2024-01-01", "NO2", "Texas", None, 1.0)], OnConflict::Ignore)
            .await
            .unwrap();

        let batch = vec![
            obs("2024-01-05", "NO2", "Texas", None, 5.0),
            obs("2024-01-01", "NO2", "Texas", None, 9.0),
        ];
        let err = db.insert_observations(&batch, OnConflict::Fail).await.unwrap_err();
        assert!(matches!(err, DbError::Conflict(_)));

        // The non-conflicting row from the failed batch was rolled back
        let rows = db.latest_observations(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date_local, "2024-01-01");
    }

    #[tokio::test]
    async fn test_latest_and_last_date() {
        let db = Database::new_in_memory().await.unwrap();
        let rows = vec![
            obs("2024-01-01", "NO2", "Texas", None, 1.0),
            obs("2024-03-01", "Ozone", "Texas", None, 2.0),
            obs("2024-02-01", "NO2", "Ohio", None, 3.0),
        ];
        db.insert_observations(&rows, OnConflict::Ignore).await.unwrap();

        let latest = db.latest_observations(2).await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].date_local, "2024-03-01");
        assert_eq!(latest[1].date_local, "2024-02-01");

        let d = |s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok();
        assert_eq!(db.last_observation_date(None, None).await.unwrap(), d("2024-03-01"));
        assert_eq!(
            db.last_observation_date(Some("Texas"), Some("NO2")).await.unwrap(),
            d("2024-01-01")
        );
        assert_eq!(db.last_observation_date(Some("Utah"), None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_targets_and_filters() {
        let db = Database::new_in_memory().await.unwrap();
        let rows = vec![
            obs("2024-01-01", "NO2", "Texas", Some("Harris"), 1.0),
            obs("2024-01-01", "NO2", "Ohio", None, 1.0),
            obs("2024-01-01", "Ozone", "Utah", Some("Salt Lake"), 1.0),
        ];
        db.insert_observations(&rows, OnConflict::Ignore).await.unwrap();

        assert_eq!(db.list_targets().await.unwrap(), vec!["NO2", "Ozone"]);

        let filters = db.list_filters(Some("NO2")).await.unwrap();
        assert_eq!(filters.state_name, vec!["Ohio", "Texas"]);
        assert_eq!(filters.county_name, vec!["Harris"]);
        assert!(filters.city_name.is_empty());

        let all = db.list_filters(None).await.unwrap();
        assert_eq!(all.state_name.len(), 3);
    }

    #[test]
    fn test_on_conflict_parse() {
        assert_eq!("IGNORE".parse::<OnConflict>().unwrap(), OnConflict::Ignore);
        assert_eq!("fail".parse::<OnConflict>().unwrap(), OnConflict::Fail);
        assert!("replace".parse::<OnConflict>().is_err());
    }
}
