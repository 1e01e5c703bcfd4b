// crates/core/src/forecast/ewma.rs
use super::{ensure_usable, validate_horizon};
use crate::calendar::horizon_dates;
use crate::error::ForecastError;
use crate::types::SeriesPoint;

pub const DEFAULT_SPAN: usize = 14;

/// Flat forecast at the last exponentially weighted moving average.
///
/// Smoothing factor is `2 / (span + 1)`, applied recursively from the first
/// observation (no bias adjustment). The recursion runs on the calendar: a
/// missing day contributes no value but still decays the running average's
/// weight by `1 - alpha`.
pub fn ewma(history: &[SeriesPoint], h: usize, span: usize) -> Result<Vec<SeriesPoint>, ForecastError> {
    ensure_usable(history)?;
    validate_horizon(h)?;

    let mut sorted = history.to_vec();
    sorted.sort_by_key(|p| p.date);

    let alpha = 2.0 / (span.max(1) as f64 + 1.0);
    let mut smoothed = sorted[0].value;
    for pair in sorted.windows(2) {
        let gap = (pair[1].date - pair[0].date).num_days().max(1);
        let old_weight = (1.0 - alpha).powi(gap as i32);
        smoothed = (old_weight * smoothed + alpha * pair[1].value) / (old_weight + alpha);
    }

    let last_date = sorted[sorted.len() - 1].date;
    Ok(horizon_dates(last_date, h)
        .into_iter()
        .map(|date| SeriesPoint::new(date, smoothed))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_ewma_recursion() {
        // span 3 -> alpha 0.5: 0 -> 2 -> 3
        let history = vec![
            SeriesPoint::new(d(2024, 1, 1), 0.0),
            SeriesPoint::new(d(2024, 1, 2), 4.0),
            SeriesPoint::new(d(2024, 1, 3), 4.0),
        ];
        let forecast = ewma(&history, 3, 3).unwrap();
        assert_eq!(forecast.len(), 3);
        assert!(forecast.iter().all(|p| p.value == 3.0));
        assert_eq!(forecast[0].date, d(2024, 1, 4));
        assert_eq!(forecast[2].date, d(2024, 1, 6));
    }

    #[test]
    fn test_ewma_decays_across_missing_days() {
        // span 3 -> alpha 0.5; one missing day leaves the old weight at 0.25,
        // so the next value lands at (0.25 * 0 + 0.5 * 4) / 0.75
        let history = vec![
            SeriesPoint::new(d(2024, 1, 1), 0.0),
            SeriesPoint::new(d(2024, 1, 3), 4.0),
        ];
        let forecast = ewma(&history, 2, 3).unwrap();
        assert!((forecast[0].value - 8.0 / 3.0).abs() < 1e-12);
        assert_eq!(forecast[0].date, d(2024, 1, 4));

        let contiguous = vec![
            SeriesPoint::new(d(2024, 1, 1), 0.0),
            SeriesPoint::new(d(2024, 1, 2), 4.0),
        ];
        assert_eq!(ewma(&contiguous, 1, 3).unwrap()[0].value, 2.0);
    }

    #[test]
    fn test_ewma_sorts_history() {
        let history = vec![
            SeriesPoint::new(d(2024, 1, 3), 4.0),
            SeriesPoint::new(d(2024, 1, 1), 0.0),
            SeriesPoint::new(d(2024, 1, 2), 4.0),
        ];
        let forecast = ewma(&history, 1, 3).unwrap();
        assert_eq!(forecast[0].value, 3.0);
    }

    #[test]
    fn test_ewma_rejects_empty() {
        assert_eq!(ewma(&[], 3, DEFAULT_SPAN), Err(ForecastError::EmptySeries));
    }
}
