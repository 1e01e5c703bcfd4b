// crates/core/src/error.rs
use thiserror::Error;

/// Errors that can occur when parsing an uploaded observations CSV
#[derive(Debug, Error, PartialEq)]
pub enum IngestError {
    #[error("CSV input is empty")]
    Empty,

    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Malformed CSV at line {line}: {message}")]
    Malformed { line: usize, message: String },
}

/// Errors raised by the forecasting routines
#[derive(Debug, Error, PartialEq)]
pub enum ForecastError {
    #[error("Cannot forecast an empty series")]
    EmptySeries,

    #[error("Forecast horizon must be between 1 and {max}, got {got}")]
    InvalidHorizon { got: usize, max: usize },

    #[error("Series contains non-finite values")]
    NonFinite,

    #[error("Model produced a non-finite forecast at step {step}")]
    Diverged { step: usize },
}

/// Errors returned by a [`crate::SeriesRepository`] implementation
#[derive(Debug, Error)]
pub enum SeriesSourceError {
    #[error("No observations for the requested selection")]
    NoData,

    #[error("Series backend error: {0}")]
    Backend(String),
}
