// crates/server/src/jobs/heartbeat.rs
//! Heartbeat staleness: derive the observed state of a persisted job.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::types::{Job, JobState};

/// A `running` job whose heartbeat is older than this is reported `paused`.
pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(30);

/// Time since the last heartbeat, clamped to zero for clock skew.
pub fn heartbeat_age(job: &Job, now: DateTime<Utc>) -> Duration {
    (now - job.last_heartbeat).to_std().unwrap_or(Duration::ZERO)
}

/// The state a client should see.
///
/// Only `running` ever changes: it becomes `paused` once the heartbeat is
/// strictly older than `stale_after`. `queued`, `done` and `error` pass
/// through unchanged.
pub fn observed_state(job: &Job, now: DateTime<Utc>, stale_after: Duration) -> JobState {
    match job.state {
        JobState::Running if heartbeat_age(job, now) > stale_after => JobState::Paused,
        state => state,
    }
}

/// Whether the heartbeat is recent enough that some runner may still own it.
pub fn is_fresh(job: &Job, now: DateTime<Utc>, stale_after: Duration) -> bool {
    heartbeat_age(job, now) <= stale_after
}
