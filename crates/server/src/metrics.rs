//! Application metrics for Prometheus monitoring.
//!
//! This module provides:
//! - Prometheus metrics recorder initialization
//! - Metric definitions for the job lifecycle and CSV ingest
//! - Helper functions for recording metrics
//!
//! The `/metrics` handler lives in `routes::metrics`.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize the Prometheus metrics recorder.
///
/// This should be called once at application startup, before any metrics are recorded.
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        return false;
    }

    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    if metrics::set_global_recorder(recorder).is_err() {
        tracing::warn!("Failed to set global metrics recorder (already set)");
        return false;
    }

    if PROMETHEUS_HANDLE.set(handle).is_err() {
        tracing::warn!("Failed to store Prometheus handle (already set)");
    }

    describe_metrics();

    tracing::info!("Prometheus metrics initialized");
    true
}

fn describe_metrics() {
    // Job lifecycle
    describe_counter!("tsf_jobs_started_total", "Forecast jobs started");
    describe_counter!("tsf_jobs_resumed_total", "Forecast jobs resumed");
    describe_counter!(
        "tsf_jobs_finished_total",
        "Runner attempts finished, by outcome (done, error, conflict)"
    );
    describe_counter!(
        "tsf_job_steps_total",
        "Forecast steps completed, by phase (SES-M, SES-Q)"
    );
    describe_histogram!(
        "tsf_job_duration_seconds",
        "Wall-clock duration of one runner attempt in seconds"
    );

    // Ingest
    describe_counter!(
        "tsf_ingest_rows_total",
        "Uploaded CSV rows, by result (inserted, duplicate, skipped)"
    );
}

/// Render current metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|h| h.render())
}

pub fn record_job_started() {
    counter!("tsf_jobs_started_total").increment(1);
}

pub fn record_job_resumed() {
    counter!("tsf_jobs_resumed_total").increment(1);
}

/// Record the end of one runner attempt.
pub fn record_job_finished(outcome: &str, duration: Duration) {
    counter!("tsf_jobs_finished_total", "outcome" => outcome.to_string()).increment(1);
    histogram!("tsf_job_duration_seconds").record(duration.as_secs_f64());
}

pub fn record_job_step(phase: &str) {
    counter!("tsf_job_steps_total", "phase" => phase.to_string()).increment(1);
}

/// Record the outcome of a CSV upload.
///
/// # Arguments
/// * `inserted` - Rows written to the store
/// * `duplicates` - Rows ignored by the conflict policy
/// * `skipped` - Rows dropped during parsing
pub fn record_ingest(inserted: u64, duplicates: u64, skipped: u64) {
    counter!("tsf_ingest_rows_total", "result" => "inserted").increment(inserted);
    counter!("tsf_ingest_rows_total", "result" => "duplicate").increment(duplicates);
    counter!("tsf_ingest_rows_total", "result" => "skipped").increment(skipped);
}
