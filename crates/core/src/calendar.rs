// crates/core/src/calendar.rs
//! Calendar period helpers for the monthly and quarterly forecast passes.

use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};

/// Resampling cadence of a forecast sub-phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cadence {
    Monthly,
    Quarterly,
}

impl Cadence {
    /// Column header and progress-message prefix for this cadence.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Monthly => "SES-M",
            Self::Quarterly => "SES-Q",
        }
    }

    fn months_per_period(&self) -> u32 {
        match self {
            Self::Monthly => 1,
            Self::Quarterly => 3,
        }
    }

    /// First day of the period containing `date`.
    pub fn period_start(&self, date: NaiveDate) -> NaiveDate {
        let span = self.months_per_period();
        let month0 = (date.month0() / span) * span;
        // Day 1 of a month in range always exists.
        NaiveDate::from_ymd_opt(date.year(), month0 + 1, 1).unwrap_or(date)
    }

    /// Running period number, comparable across years.
    pub fn period_index(&self, date: NaiveDate) -> i64 {
        let months = date.year() as i64 * 12 + date.month0() as i64;
        months.div_euclid(self.months_per_period() as i64)
    }

    /// Signed number of periods from the period of `from` to the period of `to`.
    pub fn periods_between(&self, from: NaiveDate, to: NaiveDate) -> i64 {
        self.period_index(to) - self.period_index(from)
    }

    /// First day of the period after the one containing `date`.
    pub fn next_period_start(&self, date: NaiveDate) -> NaiveDate {
        let start = self.period_start(date);
        let months = start.month0() + self.months_per_period();
        let (year, month0) = (start.year() + (months / 12) as i32, months % 12);
        NaiveDate::from_ymd_opt(year, month0 + 1, 1).unwrap_or(start)
    }

    /// Last day of the period containing `date`.
    pub fn period_end(&self, date: NaiveDate) -> NaiveDate {
        self.next_period_start(date) - Duration::days(1)
    }
}

/// The `h` calendar days following `last_observed`.
pub fn horizon_dates(last_observed: NaiveDate, h: usize) -> Vec<NaiveDate> {
    (1..=h as i64)
        .map(|i| last_observed + Duration::days(i))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_period_start() {
        assert_eq!(Cadence::Monthly.period_start(d(2024, 2, 29)), d(2024, 2, 1));
        assert_eq!(Cadence::Quarterly.period_start(d(2024, 2, 29)), d(2024, 1, 1));
        assert_eq!(Cadence::Quarterly.period_start(d(2024, 12, 31)), d(2024, 10, 1));
    }

    #[test]
    fn test_next_period_rolls_year() {
        assert_eq!(Cadence::Monthly.next_period_start(d(2023, 12, 15)), d(2024, 1, 1));
        assert_eq!(Cadence::Quarterly.next_period_start(d(2023, 11, 2)), d(2024, 1, 1));
        assert_eq!(Cadence::Monthly.period_end(d(2024, 2, 10)), d(2024, 2, 29));
        assert_eq!(Cadence::Quarterly.period_end(d(2024, 4, 10)), d(2024, 6, 30));
    }

    #[test]
    fn test_periods_between() {
        assert_eq!(Cadence::Monthly.periods_between(d(2023, 11, 30), d(2024, 2, 1)), 3);
        assert_eq!(Cadence::Quarterly.periods_between(d(2023, 11, 30), d(2024, 2, 1)), 1);
        assert_eq!(Cadence::Monthly.periods_between(d(2024, 3, 1), d(2024, 3, 31)), 0);
    }

    #[test]
    fn test_horizon_dates() {
        let dates = horizon_dates(d(2024, 1, 30), 3);
        assert_eq!(dates, vec![d(2024, 1, 31), d(2024, 2, 1), d(2024, 2, 2)]);
        assert!(horizon_dates(d(2024, 1, 30), 0).is_empty());
    }

    #[test]
    fn test_labels() {
        assert_eq!(Cadence::Monthly.label(), "SES-M");
        assert_eq!(Cadence::Quarterly.label(), "SES-Q");
    }
}
