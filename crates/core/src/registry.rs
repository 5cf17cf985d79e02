//! In-memory job registry.
//!
//! The single source of truth for job status. Records live until process
//! exit; nothing is persisted.

use std::collections::HashMap;
use std::path::PathBuf;

use tokio::sync::RwLock;

use crate::error::CoreError;
use crate::job::{Job, JobState};

/// Process-wide mapping from job id to job record.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between request handlers and background runners. Every transition
/// swaps the whole [`JobState`] under the write lock, so readers only ever see
/// complete states.
#[derive(Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<String, Job>>,
}

impl JobRegistry {
    /// Create a new, empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new job in the `Processing` state.
    ///
    /// Returns `Conflict` if `job_id` is already registered; the existing
    /// record is left untouched.
    pub async fn create(
        &self,
        job_id: &str,
        artist: &str,
        source_filename: &str,
    ) -> Result<(), CoreError> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(job_id) {
            return Err(CoreError::Conflict(format!("Job {job_id} already exists")));
        }
        jobs.insert(
            job_id.to_string(),
            Job::new(job_id.to_string(), artist.to_string(), source_filename.to_string()),
        );
        Ok(())
    }

    /// Transition `Processing` → `Completed`.
    pub async fn mark_completed(&self, job_id: &str, result_path: PathBuf) -> Result<(), CoreError> {
        self.finish(job_id, JobState::Completed { result_path }).await
    }

    /// Transition `Processing` → `Failed`.
    pub async fn mark_failed(&self, job_id: &str, error: String) -> Result<(), CoreError> {
        self.finish(job_id, JobState::Failed { error }).await
    }

    /// Transition `Completed` → `Failed` after the result file went missing.
    ///
    /// This is the only transition out of a terminal state and is reserved
    /// for result retrieval. Any other source state is a `Conflict`.
    pub async fn invalidate_result(&self, job_id: &str, error: String) -> Result<(), CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id).ok_or_else(|| not_found(job_id))?;

        if !matches!(job.state, JobState::Completed { .. }) {
            return Err(CoreError::Conflict(format!(
                "Job {job_id} is {}, only completed jobs can be invalidated",
                job.state.label()
            )));
        }

        job.state = JobState::Failed { error };
        Ok(())
    }

    /// Snapshot of the job, or `None` if the id is unknown.
    pub async fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().await.get(job_id).cloned()
    }

    /// Number of jobs tracked since startup.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    /// Whether no job has been registered yet.
    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    async fn finish(&self, job_id: &str, terminal: JobState) -> Result<(), CoreError> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(job_id).ok_or_else(|| not_found(job_id))?;

        if job.state.is_terminal() {
            return Err(CoreError::Conflict(format!(
                "Job {job_id} is already {}",
                job.state.label()
            )));
        }

        job.state = terminal;
        job.finished_at = Some(chrono::Utc::now());
        Ok(())
    }
}

fn not_found(job_id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "Job",
        id: job_id.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
