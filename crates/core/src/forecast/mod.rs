// crates/core/src/forecast/mod.rs
//! Forecasting routines and the series preparation they share.
//!
//! - [`ses`]: additive-trend exponential smoothing used by background jobs
//! - [`naive`]: seasonal-naive by day of week
//! - [`ewma`]: flat exponentially weighted moving average

pub mod ewma;
pub mod naive;
pub mod ses;

pub use ewma::ewma;
pub use naive::seasonal_naive_dow;
pub use ses::ExponentialSmoothing;

use chrono::NaiveDate;

use crate::calendar::Cadence;
use crate::error::ForecastError;
use crate::types::SeriesPoint;

/// Largest horizon (in days) any forecast accepts.
pub const MAX_HORIZON: usize = 365;

/// Default horizon when a request does not name one.
pub const DEFAULT_HORIZON: usize = 30;

/// Mean value of one calendar period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodMean {
    pub start: NaiveDate,
    pub value: f64,
}

pub fn validate_horizon(h: usize) -> Result<usize, ForecastError> {
    if (1..=MAX_HORIZON).contains(&h) {
        Ok(h)
    } else {
        Err(ForecastError::InvalidHorizon {
            got: h,
            max: MAX_HORIZON,
        })
    }
}

/// Reject empty series and series containing NaN or infinities.
pub fn ensure_usable(points: &[SeriesPoint]) -> Result<(), ForecastError> {
    if points.is_empty() {
        return Err(ForecastError::EmptySeries);
    }
    if points.iter().any(|p| !p.value.is_finite()) {
        return Err(ForecastError::NonFinite);
    }
    Ok(())
}

/// Sort by date and fill every missing calendar day by linear interpolation
/// between its neighbours. Duplicate dates keep the last value seen.
pub fn daily_fill(points: &[SeriesPoint]) -> Vec<SeriesPoint> {
    let mut sorted: Vec<SeriesPoint> = points.to_vec();
    sorted.sort_by_key(|p| p.date);
    sorted.dedup_by(|later, earlier| {
        if later.date == earlier.date {
            earlier.value = later.value;
            true
        } else {
            false
        }
    });

    let mut out = Vec::with_capacity(sorted.len());
    for pair in sorted.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        out.push(a);
        let gap = (b.date - a.date).num_days();
        for step in 1..gap {
            let t = step as f64 / gap as f64;
            out.push(SeriesPoint::new(
                a.date + chrono::Duration::days(step),
                a.value + (b.value - a.value) * t,
            ));
        }
    }
    if let Some(last) = sorted.last() {
        out.push(*last);
    }
    out
}

/// Collapse a daily series into per-period means.
///
/// A trailing period that the data does not cover to its last day is dropped
/// when at least two periods exist, so a half-observed month does not drag
/// the fit.
pub fn period_means(daily: &[SeriesPoint], cadence: Cadence) -> Vec<PeriodMean> {
    let mut means: Vec<PeriodMean> = Vec::new();
    let mut sum = 0.0;
    let mut count = 0usize;

    for point in daily {
        let start = cadence.period_start(point.date);
        let same_period = means.last().is_some_and(|m| m.start == start);
        if !same_period {
            if let Some(prev) = means.last_mut() {
                prev.value = sum / count as f64;
            }
            means.push(PeriodMean { start, value: 0.0 });
            sum = 0.0;
            count = 0;
        }
        sum += point.value;
        count += 1;
    }
    if let Some(last) = means.last_mut() {
        last.value = sum / count.max(1) as f64;
    }

    if means.len() >= 2 {
        if let (Some(last_point), Some(last_period)) = (daily.last(), means.last()) {
            if last_point.date < cadence.period_end(last_period.start) {
                means.pop();
            }
        }
    }
    means
}
