//! Handler for polling a job and downloading its result.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header;
use axum::http::HeaderValue;
use axum::response::{IntoResponse, Response};
use axum::Json;
use rvc_core::error::{ConvertError, CoreError};
use rvc_core::job::JobState;
use tokio_util::io::ReaderStream;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Offers the stream as a download named `converted.wav`.
const ATTACHMENT_DISPOSITION: &str = "attachment; filename=\"converted.wav\"";

/// GET /result/{job_id}
///
/// Returns `{"status": "processing"}` or `{"status": "failed", "error": ...}`
/// while the job is not downloadable, and streams the WAV file once it is.
/// A completed job whose file has disappeared is flipped to failed.
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let job = state
        .registry
        .get(&job_id)
        .await
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: "Job",
                id: job_id.clone(),
            })
        })?;

    let result_path = match job.state {
        JobState::Completed { result_path } => result_path,
        pending_or_failed => return Ok(Json(pending_or_failed).into_response()),
    };

    let file = match tokio::fs::File::open(&result_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::error!(
                job_id = %job_id,
                path = %result_path.display(),
                "Result file missing for completed job",
            );
            return Ok(Json(invalidate(&state, &job_id).await).into_response());
        }
        Err(e) => {
            return Err(AppError::InternalError(format!(
                "Failed to open result {}: {e}",
                result_path.display()
            )))
        }
    };

    let len = file
        .metadata()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?
        .len();

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("audio/wav")),
            (
                header::CONTENT_DISPOSITION,
                HeaderValue::from_static(ATTACHMENT_DISPOSITION),
            ),
            (header::CONTENT_LENGTH, HeaderValue::from(len)),
        ],
        Body::from_stream(ReaderStream::new(file)),
    )
        .into_response())
}

/// Flip a completed job to failed and return the state to report.
///
/// If another request already flipped it, the recorded failure is returned
/// so every poll sees the same payload.
async fn invalidate(state: &AppState, job_id: &str) -> JobState {
    let error =
        ConvertError::InconsistentState("Result file missing after conversion.".to_string())
            .to_string();

    if let Err(e) = state.registry.invalidate_result(job_id, error.clone()).await {
        tracing::warn!(job_id = %job_id, error = %e, "Could not invalidate job result");
    }

    match state.registry.get(job_id).await.map(|job| job.state) {
        Some(failed @ JobState::Failed { .. }) => failed,
        _ => JobState::Failed { error },
    }
}
