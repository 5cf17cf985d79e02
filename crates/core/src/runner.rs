//! Background execution of conversion jobs.
//!
//! [`JobRunner::spawn`] hands a job to the Tokio runtime and returns
//! immediately. The spawned unit converts the upload, removes the scratch
//! upload whatever the outcome, and then records the terminal state in the
//! [`JobRegistry`]. Nothing escapes the unit: converter errors and panics both end up
//! as a `Failed` job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;

use crate::conversion::Converter;
use crate::registry::JobRegistry;
use crate::types::JobId;

/// One unit of background work. The job must already be registered as
/// `Processing`.
#[derive(Debug, Clone)]
pub struct ConversionJob {
    pub job_id: JobId,
    /// Scratch copy of the upload; deleted when the job finishes.
    pub upload_path: PathBuf,
    pub artist: String,
}

/// Schedules and executes conversion jobs.
///
/// Cheaply cloneable; all clones share the same registry, converter and
/// task tracker.
#[derive(Clone)]
pub struct JobRunner {
    registry: Arc<JobRegistry>,
    converter: Arc<dyn Converter>,
    tracker: TaskTracker,
}

impl JobRunner {
    pub fn new(registry: Arc<JobRegistry>, converter: Arc<dyn Converter>) -> Self {
        Self {
            registry,
            converter,
            tracker: TaskTracker::new(),
        }
    }

    /// Run `job` in the background without waiting for it.
    pub fn spawn(&self, job: ConversionJob) {
        let runner = self.clone();
        self.tracker.spawn(async move { runner.run(job).await });
    }

    /// Number of spawned jobs that have not finished yet.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Execute `job` to completion on the current task.
    pub async fn run(&self, job: ConversionJob) {
        let ConversionJob {
            job_id,
            upload_path,
            artist,
        } = job;

        tracing::info!(
            job_id = %job_id,
            artist = %artist,
            path = %upload_path.display(),
            "Starting conversion",
        );

        // The converter runs on its own task so a panic inside it surfaces
        // here as a `JoinError` instead of tearing down this unit.
        let converter = Arc::clone(&self.converter);
        let input = upload_path.clone();
        let selected = artist.clone();
        let outcome =
            tokio::spawn(async move { converter.convert(&input, &selected).await }).await;

        // The upload is gone before any terminal state becomes visible.
        remove_upload(&job_id, &upload_path).await;

        let recorded = match outcome {
            Ok(Ok(result_path)) => {
                tracing::info!(
                    job_id = %job_id,
                    output = %result_path.display(),
                    "Conversion completed",
                );
                self.registry.mark_completed(&job_id, result_path).await
            }
            Ok(Err(e)) => {
                tracing::error!(
                    job_id = %job_id,
                    kind = e.kind(),
                    error = %e,
                    "Conversion failed",
                );
                self.registry.mark_failed(&job_id, e.to_string()).await
            }
            Err(join_err) => {
                tracing::error!(job_id = %job_id, error = %join_err, "Conversion task aborted");
                self.registry
                    .mark_failed(&job_id, format!("Conversion task aborted: {join_err}"))
                    .await
            }
        };

        if let Err(e) = recorded {
            tracing::warn!(job_id = %job_id, error = %e, "Could not record job outcome");
        }
    }

    /// Stop accepting jobs and wait up to `timeout` for in-flight ones.
    ///
    /// Returns `true` if every job finished in time.
    pub async fn shutdown(&self, timeout: Duration) -> bool {
        self.tracker.close();
        tokio::time::timeout(timeout, self.tracker.wait())
            .await
            .is_ok()
    }
}

/// Best-effort deletion of the scratch upload. Failures are only logged.
async fn remove_upload(job_id: &str, path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(job_id = %job_id, path = %path.display(), "Removed scratch upload");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(
                job_id = %job_id,
                path = %path.display(),
                error = %e,
                "Failed to remove scratch upload",
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
