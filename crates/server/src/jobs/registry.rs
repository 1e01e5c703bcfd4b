// crates/server/src/jobs/registry.rs
//! In-process ownership of job ids.
//!
//! At most one runner per id in this process. The guard is moved into the
//! spawned task and releases the id when dropped, including on panic unwind.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
pub struct JobRegistry {
    owned: Mutex<HashSet<String>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `job_id`. Returns `None` if it is already owned.
    pub fn try_acquire(self: &Arc<Self>, job_id: &str) -> Option<OwnershipGuard> {
        let inserted = match self.owned.lock() {
            Ok(mut owned) => owned.insert(job_id.to_string()),
            Err(poisoned) => {
                tracing::error!("Mutex poisoned acquiring job ownership, recovering");
                poisoned.into_inner().insert(job_id.to_string())
            }
        };
        inserted.then(|| OwnershipGuard {
            registry: Arc::clone(self),
            job_id: job_id.to_string(),
        })
    }

    pub fn is_owned(&self, job_id: &str) -> bool {
        match self.owned.lock() {
            Ok(owned) => owned.contains(job_id),
            Err(poisoned) => {
                tracing::error!("Mutex poisoned reading job ownership, recovering");
                poisoned.into_inner().contains(job_id)
            }
        }
    }

    pub fn owned_ids(&self) -> Vec<String> {
        match self.owned.lock() {
            Ok(owned) => owned.iter().cloned().collect(),
            Err(poisoned) => {
                tracing::error!("Mutex poisoned listing job ownership, recovering");
                poisoned.into_inner().iter().cloned().collect()
            }
        }
    }

    fn release(&self, job_id: &str) {
        match self.owned.lock() {
            Ok(mut owned) => {
                owned.remove(job_id);
            }
            Err(poisoned) => {
                tracing::error!("Mutex poisoned releasing job ownership, recovering");
                poisoned.into_inner().remove(job_id);
            }
        }
    }
}

/// Releases ownership of a job id on drop.
#[derive(Debug)]
pub struct OwnershipGuard {
    registry: Arc<JobRegistry>,
    job_id: String,
}

impl OwnershipGuard {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for OwnershipGuard {
    fn drop(&mut self) {
        self.registry.release(&self.job_id);
        tracing::debug!(job_id = %self.job_id, "job ownership released");
    }
}
