// crates/core/src/forecast/naive.rs
use chrono::{Datelike, Duration};

use super::{ensure_usable, validate_horizon};
use crate::calendar::horizon_dates;
use crate::error::ForecastError;
use crate::types::SeriesPoint;

/// Default number of past weeks averaged per weekday.
pub const DEFAULT_LOOKBACK_WEEKS: usize = 8;

/// Seasonal-naive forecast by day of week.
///
/// Each future day gets the mean of the same weekday over the last
/// `lookback_weeks` weeks of history. When no such day was observed the
/// overall mean is used.
pub fn seasonal_naive_dow(
    history: &[SeriesPoint],
    h: usize,
    lookback_weeks: usize,
) -> Result<Vec<SeriesPoint>, ForecastError> {
    ensure_usable(history)?;
    validate_horizon(h)?;

    let last_date = history
        .iter()
        .map(|p| p.date)
        .max()
        .ok_or(ForecastError::EmptySeries)?;
    let window_start = last_date - Duration::weeks(lookback_weeks.max(1) as i64);
    let overall = history.iter().map(|p| p.value).sum::<f64>() / history.len() as f64;

    let forecast = horizon_dates(last_date, h)
        .into_iter()
        .map(|date| {
            let weekday = date.weekday();
            let recent: Vec<f64> = history
                .iter()
                .filter(|p| p.date > window_start && p.date.weekday() == weekday)
                .map(|p| p.value)
                .collect();
            let value = if recent.is_empty() {
                overall
            } else {
                recent.iter().sum::<f64>() / recent.len() as f64
            };
            SeriesPoint::new(date, value)
        })
        .collect();

    Ok(forecast)
}
