//! Job model and job-id issuance.
//!
//! A job moves through a small state machine:
//!
//! ```text
//! Processing ──[converter ok]────► Completed { result_path }
//!            ──[converter error]─► Failed { error }
//! Completed  ──[result vanished]─► Failed { error }
//! ```
//!
//! The terminal payload lives inside the state variant, so a job can never
//! carry both a result path and an error, or either one while processing.

use std::path::PathBuf;

use serde::Serialize;

use crate::types::{JobId, Timestamp};

/// Current state of a job, including its terminal payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobState {
    /// The conversion has been scheduled or is running.
    Processing,
    /// The conversion produced `result_path`.
    Completed { result_path: PathBuf },
    /// The conversion (or later retrieval) failed with `error`.
    Failed { error: String },
}

impl JobState {
    /// Whether no further converter-driven transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Processing)
    }

    /// Lowercase status label as exposed to polling clients.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
        }
    }
}

/// One tracked conversion request.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: JobId,
    /// Artist selector the job was submitted with.
    pub artist: String,
    /// Original client-side filename of the upload.
    pub source_filename: String,
    pub state: JobState,
    pub created_at: Timestamp,
    /// Set on the first terminal transition.
    pub finished_at: Option<Timestamp>,
}

impl Job {
    /// Create a job in the `Processing` state.
    pub fn new(id: JobId, artist: String, source_filename: String) -> Self {
        Self {
            id,
            artist,
            source_filename,
            state: JobState::Processing,
            created_at: chrono::Utc::now(),
            finished_at: None,
        }
    }
}

/// Build a job id of the form `<artist>_<filename>_<token>`.
///
/// Spaces in the filename become underscores. The trailing token is a fresh
/// UUID, so two identical submissions never share an id.
pub fn new_job_id(artist: &str, filename: &str) -> JobId {
    let token = uuid::Uuid::new_v4().simple();
    format!("{artist}_{}_{token}", filename.replace(' ', "_"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
