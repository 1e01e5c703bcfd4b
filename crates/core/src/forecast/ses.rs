// crates/core/src/forecast/ses.rs
//! Additive-trend exponential smoothing (Holt's linear method).
//!
//! The series is z-scaled before fitting and the smoothing parameters are
//! chosen by grid search on the one-step-ahead squared error. Forecasts are
//! mapped back to the original scale and clipped to a wide interquartile
//! envelope of the training data so a steep fitted trend cannot run away
//! over long horizons.

use crate::error::ForecastError;

const ALPHA_GRID: std::ops::RangeInclusive<u32> = 1..=19; // 0.05 ..= 0.95
const BETA_GRID: std::ops::RangeInclusive<u32> = 0..=10; // 0.00 ..= 0.50
const GRID_STEP: f64 = 0.05;

/// Multiple of the IQR allowed beyond the quartiles.
const CLIP_IQR_MULTIPLE: f64 = 10.0;

/// A fitted model, ready to produce forecasts `k` periods ahead.
#[derive(Debug, Clone, PartialEq)]
pub struct ExponentialSmoothing {
    level: f64,
    trend: f64,
    alpha: f64,
    beta: f64,
    mean: f64,
    scale: f64,
    lower: f64,
    upper: f64,
}

impl ExponentialSmoothing {
    /// Fit on a chronologically ordered series of period values.
    pub fn fit(values: &[f64]) -> Result<Self, ForecastError> {
        if values.is_empty() {
            return Err(ForecastError::EmptySeries);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::NonFinite);
        }

        let (lower, upper) = clip_envelope(values);
        let last = values[values.len() - 1];
        let constant = values.iter().all(|v| *v == values[0]);
        if values.len() < 2 || constant {
            return Ok(Self::flat(last, lower, upper));
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let scale = if var.sqrt().is_finite() && var > 0.0 {
            var.sqrt()
        } else {
            1.0
        };
        let z: Vec<f64> = values.iter().map(|v| (v - mean) / scale).collect();

        let mut best: Option<(f64, Fit)> = None;
        for a in ALPHA_GRID {
            for b in BETA_GRID {
                let fit = run(&z, a as f64 * GRID_STEP, b as f64 * GRID_STEP);
                if best.as_ref().map_or(true, |(sse, _)| fit.sse < *sse) {
                    best = Some((fit.sse, fit));
                }
            }
        }
        let (_, fit) = best.ok_or(ForecastError::EmptySeries)?;

        Ok(Self {
            level: fit.level,
            trend: fit.trend,
            alpha: fit.alpha,
            beta: fit.beta,
            mean,
            scale,
            lower,
            upper,
        })
    }

    fn flat(value: f64, lower: f64, upper: f64) -> Self {
        Self {
            level: 0.0,
            trend: 0.0,
            alpha: 1.0,
            beta: 0.0,
            mean: value,
            scale: 1.0,
            lower,
            upper,
        }
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    /// Forecast `steps_ahead` periods past the last fitted period.
    pub fn forecast(&self, steps_ahead: usize) -> Result<f64, ForecastError> {
        let z = self.level + self.trend * steps_ahead as f64;
        let value = (z * self.scale + self.mean).clamp(self.lower, self.upper);
        if value.is_finite() {
            Ok(value)
        } else {
            Err(ForecastError::Diverged { step: steps_ahead })
        }
    }
}

struct Fit {
    level: f64,
    trend: f64,
    alpha: f64,
    beta: f64,
    sse: f64,
}

fn run(z: &[f64], alpha: f64, beta: f64) -> Fit {
    let mut level = z[0];
    let mut trend = z[1] - z[0];
    let mut sse = 0.0;
    for &y in &z[1..] {
        let predicted = level + trend;
        sse += (y - predicted).powi(2);
        let next_level = alpha * y + (1.0 - alpha) * predicted;
        trend = beta * (next_level - level) + (1.0 - beta) * trend;
        level = next_level;
    }
    Fit {
        level,
        trend,
        alpha,
        beta,
        sse,
    }
}

/// `[q1 - k*iqr, q3 + k*iqr]` with linear-interpolated quartiles.
fn clip_envelope(values: &[f64]) -> (f64, f64) {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let q1 = quantile(&sorted, 0.25);
    let q3 = quantile(&sorted, 0.75);
    let iqr = (q3 - q1).max(1e-9);
    (q1 - CLIP_IQR_MULTIPLE * iqr, q3 + CLIP_IQR_MULTIPLE * iqr)
}

fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
