// crates/server/src/jobs/store.rs
//! Durable job records: `<jobs_dir>/<job_id>.json`, one file per job.
//!
//! Every write goes through a temp file in the same directory, is fsynced,
//! then renamed over the record, so readers only ever see a complete record.
//! Artifacts live next to the records under `<jobs_dir>/<job_id>/`.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tempfile::NamedTempFile;

use super::types::{Job, JobParams, JobState};
use super::{JobError, JobResult};

const RECORD_EXT: &str = "json";
const MAX_ID_LEN: usize = 64;

/// Whether `id` is addressable: `[A-Za-z0-9_-]{1,64}`.
pub fn is_valid_job_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[derive(Debug, Clone)]
pub struct JobStore {
    dir: PathBuf,
}

impl JobStore {
    /// Open the store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> JobResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| JobError::storage(&dir, e))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, job_id: &str) -> JobResult<PathBuf> {
        if !is_valid_job_id(job_id) {
            return Err(JobError::NotFound(job_id.to_string()));
        }
        Ok(self.dir.join(format!("{job_id}.{RECORD_EXT}")))
    }

    /// Create a new `queued` record. Fails with `Conflict` if the id exists.
    pub fn create(&self, job_id: &str, params: JobParams) -> JobResult<Job> {
        if !is_valid_job_id(job_id) {
            return Err(JobError::Validation(format!("invalid job id: {job_id}")));
        }
        let path = self.record_path(job_id)?;
        let job = Job::new(job_id, params, Utc::now());
        let tmp = self.write_temp(&job)?;

        tmp.persist_noclobber(&path).map_err(|e| {
            if e.error.kind() == std::io::ErrorKind::AlreadyExists {
                JobError::Conflict(format!("job {job_id} already exists"))
            } else {
                JobError::storage(&path, e.error)
            }
        })?;

        tracing::debug!(job_id, "job record created");
        Ok(job)
    }

    /// Load a record. Unknown or unaddressable ids are `NotFound`.
    pub fn load(&self, job_id: &str) -> JobResult<Job> {
        let path = self.record_path(job_id)?;
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(JobError::NotFound(job_id.to_string()));
            }
            Err(e) => return Err(JobError::storage(&path, e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| JobError::Corrupt {
            path,
            message: e.to_string(),
        })
    }

    /// Atomically overwrite the record.
    ///
    /// Rejected with `Conflict` when the persisted record is already `done`
    /// or when the write would lower `done`.
    pub fn save(&self, job: &Job) -> JobResult<()> {
        let path = self.record_path(&job.job_id)?;
        match self.load(&job.job_id) {
            Ok(current) => {
                if current.state == JobState::Done {
                    return Err(JobError::Conflict(format!(
                        "job {} is already done",
                        job.job_id
                    )));
                }
                if job.done < current.done {
                    return Err(JobError::Conflict(format!(
                        "job {} progress would go backwards ({} < {})",
                        job.job_id, job.done, current.done
                    )));
                }
            }
            Err(JobError::NotFound(_)) => {}
            Err(e) => return Err(e),
        }

        let tmp = self.write_temp(job)?;
        tmp.persist(&path)
            .map_err(|e| JobError::storage(&path, e.error))?;
        Ok(())
    }

    fn write_temp(&self, job: &Job) -> JobResult<NamedTempFile> {
        let json = serde_json::to_vec_pretty(job).map_err(|e| JobError::Corrupt {
            path: self.dir.join(&job.job_id),
            message: e.to_string(),
        })?;
        write_synced(&self.dir, &json)
    }

    /// Ids of every record on disk, unordered.
    pub fn list_ids(&self) -> JobResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| JobError::storage(&self.dir, e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| JobError::storage(&self.dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(RECORD_EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if is_valid_job_id(stem) {
                    ids.push(stem.to_string());
                }
            }
        }
        Ok(ids)
    }

    /// Directory holding a job's artifact.
    pub fn artifact_dir(&self, job_id: &str) -> PathBuf {
        self.dir.join(job_id)
    }

    /// Atomically write an artifact file and return its final path.
    pub fn write_artifact(&self, job_id: &str, file_name: &str, contents: &[u8]) -> JobResult<PathBuf> {
        let dir = self.artifact_dir(job_id);
        fs::create_dir_all(&dir).map_err(|e| JobError::storage(&dir, e))?;
        let path = dir.join(file_name);
        let tmp = write_synced(&dir, contents)?;
        tmp.persist(&path)
            .map_err(|e| JobError::storage(&path, e.error))?;
        Ok(path)
    }

    /// Run `op` against this store on the blocking thread pool.
    ///
    /// Every record write is fsynced, so async callers go through here
    /// instead of calling the store from a runtime worker.
    pub async fn blocking<T, F>(&self, op: F) -> JobResult<T>
    where
        F: FnOnce(&JobStore) -> JobResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || op(&store))
            .await
            .map_err(|e| {
                JobError::storage(
                    &self.dir,
                    std::io::Error::other(format!("Task join error: {e}")),
                )
            })?
    }
}

fn write_synced(dir: &Path, contents: &[u8]) -> JobResult<NamedTempFile> {
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| JobError::storage(dir, e))?;
    tmp.write_all(contents)
        .map_err(|e| JobError::storage(tmp.path(), e))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| JobError::storage(tmp.path(), e))?;
    Ok(tmp)
}
