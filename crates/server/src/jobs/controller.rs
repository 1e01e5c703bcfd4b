// crates/server/src/jobs/controller.rs
//! Start / status / resume / download orchestration.
//!
//! The request path never waits on a runner: `start` and `resume` persist the
//! record, claim ownership, spawn the runner task and return.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tsf_core::SeriesRepository;

use super::heartbeat::{self, DEFAULT_STALE_AFTER};
use super::registry::{JobRegistry, OwnershipGuard};
use super::runner::JobRunner;
use super::store::JobStore;
use super::types::{Job, JobState, JobStatusView, StartRequest};
use super::{JobError, JobResult};

/// Tunables for [`JobController`].
#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub stale_after: Duration,
    pub step_pause: Duration,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            stale_after: DEFAULT_STALE_AFTER,
            step_pause: Duration::ZERO,
        }
    }
}

/// A finished job's CSV, ready to stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub path: PathBuf,
    pub file_name: String,
}

/// Result of the startup scan over persisted records.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReconcileReport {
    pub scanned: usize,
    pub orphans: Vec<String>,
    pub resumed: Vec<String>,
}

#[derive(Clone)]
pub struct JobController {
    store: JobStore,
    registry: Arc<JobRegistry>,
    runner: Arc<JobRunner>,
    stale_after: Duration,
}

impl JobController {
    pub fn new(
        store: JobStore,
        source: Arc<dyn SeriesRepository>,
        settings: ControllerSettings,
    ) -> Self {
        let runner = JobRunner::new(store.clone(), source, settings.step_pause);
        Self {
            store,
            registry: Arc::new(JobRegistry::new()),
            runner: Arc::new(runner),
            stale_after: settings.stale_after,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Validate the request, persist a `queued` record and launch its runner.
    pub async fn start(&self, request: StartRequest) -> JobResult<Job> {
        let params = request.into_params()?;
        let job_id = uuid::Uuid::new_v4().simple().to_string();

        let id = job_id.clone();
        let job = self
            .store
            .blocking(move |s| {
                let mut job = s.create(&id, params)?;
                job.attempts = 1;
                s.save(&job)?;
                Ok(job)
            })
            .await?;

        let guard = self
            .registry
            .try_acquire(&job_id)
            .ok_or_else(|| JobError::Conflict(format!("job {job_id} is already running")))?;
        self.launch(guard);

        crate::metrics::record_job_started();
        tracing::info!(
            job_id = %job.job_id,
            target = %job.params.target_value,
            horizon = job.params.horizon,
            "job started"
        );
        Ok(job)
    }

    /// Observed state and progress of a job.
    pub async fn status(&self, job_id: &str) -> JobResult<JobStatusView> {
        let job = self.load(job_id).await?;
        let now = Utc::now();
        Ok(JobStatusView {
            state: heartbeat::observed_state(&job, now, self.stale_after),
            heartbeat_age_secs: heartbeat::heartbeat_age(&job, now).as_secs(),
            percent: job.percent(),
            message: job.message,
            done: job.done,
            total: job.total,
            error: job.error_detail,
            job_id: job.job_id,
        })
    }

    /// Relaunch a paused, orphaned or failed job from its persisted progress.
    pub async fn resume(&self, job_id: &str) -> JobResult<Job> {
        let mut job = self.load(job_id).await?;
        if job.state == JobState::Done {
            return Err(JobError::Conflict(format!("job {job_id} is already done")));
        }

        let guard = self
            .registry
            .try_acquire(job_id)
            .ok_or_else(|| JobError::Conflict(format!("job {job_id} is already running")))?;

        // Another process may still be driving it.
        if job.state.is_active() && heartbeat::is_fresh(&job, Utc::now(), self.stale_after) {
            return Err(JobError::Conflict(format!(
                "job {job_id} has a fresh heartbeat"
            )));
        }

        job.attempts += 1;
        job.state = JobState::Queued;
        job.message = "queued".to_string();
        job.error_detail = None;
        // Claims the record until the new runner's first step.
        job.touch(Utc::now());
        let record = job.clone();
        self.store.blocking(move |s| s.save(&record)).await?;

        self.launch(guard);

        crate::metrics::record_job_resumed();
        tracing::info!(job_id, done = job.done, total = job.total, attempt = job.attempts, "job resumed");
        Ok(job)
    }

    /// Location of a finished job's artifact.
    pub async fn download(&self, job_id: &str) -> JobResult<Artifact> {
        let job = self.load(job_id).await?;
        let path = match (job.state, job.result_path) {
            (JobState::Done, Some(path)) => path,
            _ => {
                return Err(JobError::NotFound(format!(
                    "job {job_id} has no result yet"
                )))
            }
        };
        let is_file = tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false);
        if !is_file {
            return Err(JobError::NotFound(format!(
                "artifact for job {job_id} is missing"
            )));
        }
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| job.params.artifact_name().file_name());
        Ok(Artifact { path, file_name })
    }

    pub async fn list_ids(&self) -> JobResult<Vec<String>> {
        self.store.blocking(|s| s.list_ids()).await
    }

    /// Scan the store for `queued`/`running` records nobody in this process
    /// owns. With `resume_orphans`, relaunch the ones whose heartbeat is stale.
    pub async fn reconcile(&self, resume_orphans: bool) -> JobResult<ReconcileReport> {
        let ids = self.list_ids().await?;
        let mut report = ReconcileReport {
            scanned: ids.len(),
            ..Default::default()
        };

        for id in ids {
            let job = match self.load(&id).await {
                Ok(job) => job,
                Err(e) => {
                    tracing::warn!(job_id = %id, error = %e, "skipping unreadable job record");
                    continue;
                }
            };
            if !job.state.is_active() || self.registry.is_owned(&id) {
                continue;
            }
            report.orphans.push(id.clone());

            if resume_orphans {
                match self.resume(&id).await {
                    Ok(_) => report.resumed.push(id),
                    Err(e) => tracing::info!(job_id = %id, error = %e, "orphan not resumed"),
                }
            }
        }

        tracing::info!(
            scanned = report.scanned,
            orphans = report.orphans.len(),
            resumed = report.resumed.len(),
            "job store reconciled"
        );
        Ok(report)
    }

    async fn load(&self, job_id: &str) -> JobResult<Job> {
        let id = job_id.to_string();
        self.store.blocking(move |s| s.load(&id)).await
    }

    fn launch(&self, guard: OwnershipGuard) {
        let runner = Arc::clone(&self.runner);
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match runner.run(guard.job_id()).await {
                Ok(_) => "done",
                Err(JobError::Conflict(_)) => "conflict",
                Err(_) => "error",
            };
            crate::metrics::record_job_finished(outcome, started.elapsed());
            drop(guard);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::test_support::{daily_series, params, FakeRepository};
    use pretty_assertions::assert_eq;

    fn controller(points: Vec<tsf_core::SeriesPoint>) -> (tempfile::TempDir, JobController) {
        let dir = tempfile::tempdir().unwrap();
        let store = JobStore::open(dir.path()).unwrap();
        let controller = JobController::new(
            store,
            Arc::new(FakeRepository::with_points(points)),
            ControllerSettings::default(),
        );
        (dir, controller)
    }

    fn request(horizon: usize) -> StartRequest {
        StartRequest {
            target_value: Some("NO2".to_string()),
            state: Some("TX".to_string()),
            horizon: Some(horizon),
            ..Default::default()
        }
    }

    async fn wait_for(controller: &JobController, job_id: &str, state: JobState) -> JobStatusView {
        for _ in 0..500 {
            let view = controller.status(job_id).await.unwrap();
            if view.state == state {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached {state}");
    }

    /// Put a record in the "runner died" shape: running, heartbeat long ago.
    fn make_stale(controller: &JobController, job_id: &str, done: u64) {
        let mut job = controller.store().load(job_id).unwrap();
        job.state = JobState::Running;
        job.done = done;
        job.last_heartbeat = Utc::now() - chrono::Duration::minutes(5);
        // Bypass the monotonic check by writing the file directly.
        let path = controller.store().dir().join(format!("{job_id}.json"));
        std::fs::write(path, serde_json::to_vec(&job).unwrap()).unwrap();
    }

    #[tokio::test]
    async fn test_start_returns_immediately_with_zero_progress() {
        let (_dir, controller) = controller(daily_series(120));
        let job = controller.start(request(10)).await.unwrap();
        assert_eq!(job.done, 0);
        assert_eq!(job.total, 20);
        assert_eq!(job.attempts, 1);
        assert_eq!(job.job_id.len(), 32);

        let view = wait_for(&controller, &job.job_id, JobState::Done).await;
        assert_eq!(view.done, 20);
        assert_eq!(view.percent, 100.0);
        assert_eq!(view.message, "ready");
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_params() {
        let (_dir, controller) = controller(daily_series(10));
        let err = controller.start(StartRequest::default()).await.unwrap_err();
        assert!(matches!(err, JobError::Validation(_)));
        assert!(controller.list_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_status_unknown_is_not_found() {
        let (_dir, controller) = controller(daily_series(10));
        assert!(matches!(controller.status("missing").await, Err(JobError::NotFound(_))));
        assert!(matches!(controller.resume("missing").await, Err(JobError::NotFound(_))));
        assert!(matches!(controller.download("missing").await, Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_stale_running_job_reports_paused() {
        let (_dir, controller) = controller(daily_series(120));
        controller.store().create("stale1", params(10)).unwrap();
        make_stale(&controller, "stale1", 4);

        let view = controller.status("stale1").await.unwrap();
        assert_eq!(view.state, JobState::Paused);
        assert_eq!(view.done, 4);
        assert!(view.heartbeat_age_secs >= 299);
    }

    #[tokio::test]
    async fn test_resume_stale_job_continues_to_done() {
        let (_dir, controller) = controller(daily_series(120));
        controller.store().create("stale1", params(10)).unwrap();
        make_stale(&controller, "stale1", 4);

        let job = controller.resume("stale1").await.unwrap();
        assert_eq!(job.state, JobState::Queued);
        assert_eq!(job.done, 4);
        assert_eq!(job.attempts, 1);

        let view = wait_for(&controller, "stale1", JobState::Done).await;
        assert_eq!(view.done, 20);
        let artifact = controller.download("stale1").await.unwrap();
        assert_eq!(artifact.file_name, "NO2_TX_ALL_ALL_ALL_F.csv");
    }

    #[tokio::test]
    async fn test_resume_refreshes_heartbeat_before_runner_starts() {
        let (dir, controller) = controller(daily_series(120));
        controller.store().create("stale1", params(10)).unwrap();
        make_stale(&controller, "stale1", 4);

        let job = controller.resume("stale1").await.unwrap();
        // The spawned runner has not had a turn yet
        let persisted = controller.store().load("stale1").unwrap();
        assert_eq!(persisted.state, JobState::Queued);
        assert_eq!(persisted.last_heartbeat, job.last_heartbeat);
        assert!(heartbeat::is_fresh(&persisted, Utc::now(), DEFAULT_STALE_AFTER));

        // A second process sharing the jobs dir must not launch another runner
        let other = JobController::new(
            JobStore::open(dir.path()).unwrap(),
            Arc::new(FakeRepository::with_points(daily_series(120))),
            ControllerSettings::default(),
        );
        assert!(matches!(other.resume("stale1").await, Err(JobError::Conflict(_))));
        let report = other.reconcile(true).await.unwrap();
        assert!(report.resumed.is_empty());
    }

    #[tokio::test]
    async fn test_resume_done_is_conflict() {
        let (_dir, controller) = controller(daily_series(120));
        let job = controller.start(request(3)).await.unwrap();
        wait_for(&controller, &job.job_id, JobState::Done).await;
        let before = controller.store().load(&job.job_id).unwrap();

        let err = controller.resume(&job.job_id).await.unwrap_err();
        assert!(matches!(err, JobError::Conflict(_)));
        assert_eq!(controller.store().load(&job.job_id).unwrap(), before);
    }

    #[tokio::test]
    async fn test_resume_fresh_running_is_conflict() {
        let (_dir, controller) = controller(daily_series(120));
        let mut job = controller.store().create("fresh", params(3)).unwrap();
        job.state = JobState::Running;
        job.touch(Utc::now());
        controller.store().save(&job).unwrap();

        assert!(matches!(controller.resume("fresh").await, Err(JobError::Conflict(_))));
        // The failed attempt must not leave the id owned
        assert!(!controller.registry().is_owned("fresh"));
    }

    #[tokio::test]
    async fn test_resume_owned_is_conflict() {
        let (_dir, controller) = controller(daily_series(120));
        controller.store().create("owned", params(3)).unwrap();
        make_stale(&controller, "owned", 0);
        let _guard = controller.registry().try_acquire("owned").unwrap();

        assert!(matches!(controller.resume("owned").await, Err(JobError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_resume_error_job_clears_detail() {
        let (_dir, controller) = controller(Vec::new());
        let job = controller.start(request(3)).await.unwrap();
        let view = wait_for(&controller, &job.job_id, JobState::Error).await;
        assert!(view.error.is_some());

        let resumed = controller.resume(&job.job_id).await.unwrap();
        assert_eq!(resumed.attempts, 2);
        assert_eq!(resumed.error_detail, None);
        // Still no data, so it fails again
        wait_for(&controller, &job.job_id, JobState::Error).await;
    }

    #[tokio::test]
    async fn test_download_before_done_is_not_found() {
        let (_dir, controller) = controller(daily_series(10));
        controller.store().create("pending", params(3)).unwrap();
        assert!(matches!(controller.download("pending").await, Err(JobError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_reconcile_counts_and_resumes_orphans() {
        let (_dir, controller) = controller(daily_series(120));
        controller.store().create("orphan", params(3)).unwrap();
        make_stale(&controller, "orphan", 1);
        let mut errored = controller.store().create("failed", params(3)).unwrap();
        errored.state = JobState::Error;
        controller.store().save(&errored).unwrap();

        let report = controller.reconcile(false).await.unwrap();
        assert_eq!(report.scanned, 2);
        assert_eq!(report.orphans, vec!["orphan".to_string()]);
        assert!(report.resumed.is_empty());

        let report = controller.reconcile(true).await.unwrap();
        assert_eq!(report.resumed, vec!["orphan".to_string()]);
        wait_for(&controller, "orphan", JobState::Done).await;
    }
}
