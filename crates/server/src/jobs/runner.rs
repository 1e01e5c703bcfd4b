// crates/server/src/jobs/runner.rs
//! Executes the SES-M / SES-Q forecast pipeline for one job.
//!
//! Progress is persisted after every step together with the value computed
//! at that step, so a later runner bound to the same id continues exactly
//! where the previous one stopped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tsf_core::forecast::{daily_fill, ensure_usable, period_means, ExponentialSmoothing};
use tsf_core::{
    horizon_dates, render_artifact_csv, ArtifactRecord, Cadence, ForecastRow, SeriesPoint,
    SeriesRepository,
};

use super::store::JobStore;
use super::types::{Job, JobState};
use super::{JobError, JobResult};

/// Sub-phases in execution order with their offset into `done`.
fn phases(horizon: usize) -> [(usize, Cadence); 2] {
    [(0, Cadence::Monthly), (horizon, Cadence::Quarterly)]
}

fn computation(e: impl std::fmt::Display) -> JobError {
    JobError::Computation(e.to_string())
}

pub struct JobRunner {
    store: JobStore,
    source: Arc<dyn SeriesRepository>,
    step_pause: Duration,
}

impl JobRunner {
    pub fn new(store: JobStore, source: Arc<dyn SeriesRepository>, step_pause: Duration) -> Self {
        Self {
            store,
            source,
            step_pause,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// Drive `job_id` to completion.
    ///
    /// Computation failures are recorded on the job (`state = error`).
    /// Storage failures abort the attempt after a best-effort error write.
    /// A `Conflict` means another writer finished the job first; the record
    /// is left alone.
    pub async fn run(&self, job_id: &str) -> JobResult<Job> {
        match self.drive(job_id).await {
            Ok(job) => {
                tracing::info!(job_id, total = job.total, "job finished");
                Ok(job)
            }
            Err(JobError::Computation(detail)) => {
                tracing::warn!(job_id, error = %detail, "job failed");
                self.mark_error(job_id, &detail).await;
                Err(JobError::Computation(detail))
            }
            Err(e @ (JobError::Storage { .. } | JobError::Corrupt { .. })) => {
                tracing::error!(job_id, error = %e, "job aborted on storage error");
                self.mark_error(job_id, &e.to_string()).await;
                Err(e)
            }
            Err(e) => {
                tracing::warn!(job_id, error = %e, "job attempt stopped");
                Err(e)
            }
        }
    }

    async fn drive(&self, job_id: &str) -> JobResult<Job> {
        let id = job_id.to_string();
        let mut job = self.store.blocking(move |s| s.load(&id)).await?;
        if job.state == JobState::Done {
            return Err(JobError::Conflict(format!("job {job_id} is already done")));
        }

        job.state = JobState::Running;
        job.message = "loading data".to_string();
        job.error_detail = None;
        job.touch(Utc::now());
        self.save(&job).await?;

        let mut history = self
            .source
            .load_daily(&job.params.series_filter(), job.params.agg)
            .await
            .map_err(computation)?;
        // Rows uploaded after the first run must not shift the horizon
        // under values already in the checkpoint.
        if let Some(anchor) = job.last_observed {
            history.retain(|p| p.date <= anchor);
        }
        ensure_usable(&history).map_err(computation)?;

        let daily = daily_fill(&history);
        let last_observed = match job.last_observed {
            Some(anchor) => anchor,
            None => daily
                .last()
                .map(|p| p.date)
                .ok_or_else(|| computation("empty series"))?,
        };
        job.last_observed = Some(last_observed);
        let dates = horizon_dates(last_observed, job.params.horizon);

        tracing::info!(
            job_id,
            done = job.done,
            total = job.total,
            attempt = job.attempts,
            %last_observed,
            "job running"
        );

        for (offset, cadence) in phases(job.params.horizon) {
            self.run_phase(&mut job, &daily, &dates, offset, cadence)
                .await?;
        }

        self.complete(job, &dates).await
    }

    async fn run_phase(
        &self,
        job: &mut Job,
        daily: &[SeriesPoint],
        dates: &[NaiveDate],
        offset: usize,
        cadence: Cadence,
    ) -> JobResult<()> {
        let h = dates.len();
        let start = job.checkpoint.values(cadence).len().min(h);
        if start >= h {
            return Ok(());
        }

        let periods = period_means(daily, cadence);
        let last_period = periods
            .last()
            .map(|p| p.start)
            .ok_or_else(|| computation("no complete periods"))?;
        let values: Vec<f64> = periods.iter().map(|p| p.value).collect();
        let period_count = values.len();

        // Grid-search fit on the blocking pool
        let model = tokio::task::spawn_blocking(move || ExponentialSmoothing::fit(&values))
            .await
            .map_err(|e| computation(format!("Task join error: {e}")))?
            .map_err(computation)?;

        tracing::debug!(
            job_id = %job.job_id,
            phase = cadence.label(),
            from = start,
            periods = period_count,
            alpha = model.alpha(),
            beta = model.beta(),
            "phase fitted"
        );

        for (i, date) in dates.iter().enumerate().skip(start) {
            let steps = cadence.periods_between(last_period, *date).max(1) as usize;
            let value = model.forecast(steps).map_err(computation)?;

            job.checkpoint.values_mut(cadence).push(value);
            job.advance_to((offset + i + 1) as u64);
            job.message = format!("{} {}/{}", cadence.label(), i + 1, h);
            job.touch(Utc::now());
            self.save(job).await?;
            crate::metrics::record_job_step(cadence.label());

            self.pace().await;
        }
        Ok(())
    }

    async fn complete(&self, mut job: Job, dates: &[NaiveDate]) -> JobResult<Job> {
        let rows: Vec<ForecastRow> = dates
            .iter()
            .enumerate()
            .map(|(i, date)| ForecastRow {
                date: *date,
                value: None,
                ses_m: job.checkpoint.ses_m.get(i).copied(),
                ses_q: job.checkpoint.ses_q.get(i).copied(),
            })
            .collect();

        let file_name = job.params.artifact_name().file_name();
        let csv = render_artifact_csv(&rows);
        let (id, name) = (job.job_id.clone(), file_name.clone());
        let path = self
            .store
            .blocking(move |s| s.write_artifact(&id, &name, csv.as_bytes()))
            .await?;

        job.result_path = Some(path.clone());
        job.state = JobState::Done;
        job.done = job.total;
        job.message = "ready".to_string();
        job.error_detail = None;
        job.touch(Utc::now());
        self.save(&job).await?;

        let record = ArtifactRecord {
            forecast_name: file_name,
            target_value: job.params.target_value.clone(),
            state_name: job.params.state_name.clone(),
            result_path: path.display().to_string(),
        };
        if let Err(e) = self.source.record_artifact(&record).await {
            tracing::warn!(job_id = %job.job_id, error = %e, "failed to register forecast artifact");
        }

        Ok(job)
    }

    async fn save(&self, job: &Job) -> JobResult<()> {
        let job = job.clone();
        self.store.blocking(move |s| s.save(&job)).await
    }

    /// Record a failure on the persisted job. Best effort: if this write
    /// fails too, the previous record stays as it was.
    async fn mark_error(&self, job_id: &str, detail: &str) {
        let id = job_id.to_string();
        let mut job = match self.store.blocking(move |s| s.load(&id)).await {
            Ok(job) => job,
            Err(e) => {
                tracing::warn!(job_id, error = %e, "could not load job to record failure");
                return;
            }
        };
        if job.state == JobState::Done {
            return;
        }
        job.state = JobState::Error;
        job.message = "error".to_string();
        job.error_detail = Some(detail.to_string());
        job.touch(Utc::now());
        if let Err(e) = self.save(&job).await {
            tracing::warn!(job_id, error = %e, "could not record job failure");
        }
    }

    async fn pace(&self) {
        if self.step_pause.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.step_pause).await;
        }
    }
}
