// crates/core/src/types.rs
//! Shared domain types for observations and daily series.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One raw air-quality measurement as stored in `air_quality_raw`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub date_local: NaiveDate,
    pub parameter_name: String,
    pub arithmetic_mean: f64,
    pub local_site_name: Option<String>,
    pub state_name: String,
    pub county_name: Option<String>,
    pub city_name: Option<String>,
    pub cbsa_name: Option<String>,
}

/// A single (date, value) point of a daily series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint {
    pub date: NaiveDate,
    pub value: f64,
}

impl SeriesPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }
}

/// How multiple observations on the same day collapse into one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    #[default]
    Mean,
    Sum,
}

impl Aggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mean => "mean",
            Self::Sum => "sum",
        }
    }

    /// SQL aggregate function applied to `arithmetic_mean`.
    pub fn sql_function(&self) -> &'static str {
        match self {
            Self::Mean => "AVG",
            Self::Sum => "SUM",
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Self::Mean),
            "sum" => Ok(Self::Sum),
            other => Err(format!("agg must be 'mean' or 'sum', got '{other}'")),
        }
    }
}

/// Quick (non-job) forecast methods served synchronously.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    #[default]
    SeasonalNaiveDow,
    Ewma,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SeasonalNaiveDow => "seasonal_naive_dow",
            Self::Ewma => "ewma",
        }
    }
}

impl fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ForecastMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "seasonal_naive_dow" => Ok(Self::SeasonalNaiveDow),
            "ewma" => Ok(Self::Ewma),
            other => Err(format!(
                "method must be 'seasonal_naive_dow' or 'ewma', got '{other}'"
            )),
        }
    }
}

/// Selection of observations feeding a daily series.
///
/// `parameter` is mandatory; every geographic filter is optional and, when
/// present, must match exactly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesFilter {
    pub parameter: String,
    pub state: Option<String>,
    pub county: Option<String>,
    pub city: Option<String>,
    pub cbsa: Option<String>,
}

impl SeriesFilter {
    pub fn for_parameter(parameter: impl Into<String>) -> Self {
        Self {
            parameter: parameter.into(),
            ..Default::default()
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_parse() {
        assert_eq!("mean".parse::<Aggregation>().unwrap(), Aggregation::Mean);
        assert_eq!(" SUM ".parse::<Aggregation>().unwrap(), Aggregation::Sum);
        assert!("median".parse::<Aggregation>().is_err());
        assert_eq!(Aggregation::default(), Aggregation::Mean);
        assert_eq!(Aggregation::Sum.sql_function(), "SUM");
    }

    #[test]
    fn test_forecast_method_parse() {
        assert_eq!(
            "seasonal_naive_dow".parse::<ForecastMethod>().unwrap(),
            ForecastMethod::SeasonalNaiveDow
        );
        assert_eq!("ewma".parse::<ForecastMethod>().unwrap(), ForecastMethod::Ewma);
        assert!("arima".parse::<ForecastMethod>().is_err());
    }

    #[test]
    fn test_series_point_serializes_iso_date() {
        let point = SeriesPoint::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), 1.5);
        let json = serde_json::to_string(&point).unwrap();
        assert_eq!(json, r#"{"date":"2024-03-01","value":1.5}"#);
    }

    #[test]
    fn test_series_filter_builder() {
        let filter = SeriesFilter::for_parameter("NO2").with_state("TX");
        assert_eq!(filter.parameter, "NO2");
        assert_eq!(filter.state.as_deref(), Some("TX"));
        assert!(filter.county.is_none());
    }
}
