//! Handler for submitting conversion jobs.

use std::path::{Path, PathBuf};

use axum::extract::multipart::Field;
use axum::extract::{Multipart, State};
use axum::Json;
use rvc_core::job::new_job_id;
use rvc_core::runner::ConversionJob;
use serde::Serialize;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// Response for an accepted conversion.
#[derive(Debug, Serialize)]
pub struct ConvertResponse {
    pub job_id: String,
}

/// Longest client file name kept for scratch and job naming, in bytes.
const MAX_BASENAME_BYTES: usize = 128;

/// Scratch upload that is deleted when dropped, unless handed off with
/// [`ScratchFile::keep`].
///
/// Covers every way a request can end early, including the request future
/// being dropped by the timeout layer mid-upload.
#[derive(Debug)]
struct ScratchFile {
    path: PathBuf,
    armed: bool,
}

impl ScratchFile {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    /// Disarm the guard and return the path; the caller now owns the file.
    fn keep(mut self) -> PathBuf {
        self.armed = false;
        std::mem::take(&mut self.path)
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                tracing::debug!(path = %self.path.display(), "Discarded scratch upload");
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Failed to remove scratch upload",
                );
            }
        }
    }
}

/// An upload written to the scratch directory.
#[derive(Debug)]
struct SavedUpload {
    scratch: ScratchFile,
    /// Basename of the client-side file name.
    filename: String,
}

#[derive(Debug, Default)]
struct ConvertForm {
    upload: Option<SavedUpload>,
    artist: Option<String>,
}

/// POST /convert
///
/// Multipart form with a `file` part and an `artist` field. Stores the
/// upload, registers a job and schedules it, then returns the job id
/// without waiting for the conversion.
pub async fn post_convert(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<ConvertResponse>> {
    let mut form = ConvertForm::default();
    read_form(&mut multipart, &state.config.uploads_dir, &mut form).await?;

    let Some(upload) = form.upload.take() else {
        return Err(AppError::BadRequest("No file provided.".into()));
    };
    let Some(artist) = form.artist.take().filter(|a| !a.is_empty()) else {
        return Err(AppError::BadRequest("No artist provided.".into()));
    };

    let job_id = new_job_id(&artist, &upload.filename);
    state
        .registry
        .create(&job_id, &artist, &upload.filename)
        .await?;

    tracing::info!(
        job_id = %job_id,
        artist = %artist,
        filename = %upload.filename,
        "Conversion job accepted",
    );

    state.runner.spawn(ConversionJob {
        job_id: job_id.clone(),
        upload_path: upload.scratch.keep(),
        artist,
    });

    Ok(Json(ConvertResponse { job_id }))
}

/// Walk the multipart fields, saving the first non-empty `file` part.
async fn read_form(
    multipart: &mut Multipart,
    uploads_dir: &Path,
    form: &mut ConvertForm,
) -> AppResult<()> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") if form.upload.is_none() => {
                let filename = field.file_name().unwrap_or_default().to_string();
                if filename.is_empty() {
                    continue;
                }
                form.upload = Some(save_field(field, uploads_dir, &filename).await?);
            }
            Some("artist") => {
                let artist = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.artist = Some(artist.trim().to_string());
            }
            _ => {}
        }
    }
    Ok(())
}

/// Stream a file field to `<uploads_dir>/<uuid>_<basename>`.
///
/// The file is guarded from creation on, so a partial upload never
/// outlives a failed or abandoned request.
async fn save_field(
    mut field: Field<'_>,
    uploads_dir: &Path,
    filename: &str,
) -> AppResult<SavedUpload> {
    let filename = upload_basename(filename);
    let path = uploads_dir.join(scratch_name(&filename));
    let mut file = tokio::fs::File::create(&path).await.map_err(|e| {
        AppError::InternalError(format!("Failed to create {}: {e}", path.display()))
    })?;
    let scratch = ScratchFile::new(path);

    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        file.write_all(&chunk)
            .await
            .map_err(|e| AppError::InternalError(e.to_string()))?;
    }
    file.flush()
        .await
        .map_err(|e| AppError::InternalError(e.to_string()))?;

    tracing::debug!(path = %scratch.path.display(), filename = %filename, "Upload saved");
    Ok(SavedUpload { scratch, filename })
}

/// Final path component of a client-supplied file name, shortened to
/// [`MAX_BASENAME_BYTES`] with its extension kept where possible.
fn upload_basename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .filter(|b| !b.is_empty() && *b != "." && *b != "..")
        .unwrap_or("upload");
    if base.len() <= MAX_BASENAME_BYTES {
        return base.to_string();
    }

    let ext = base
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 16);
    match ext {
        Some(ext) => {
            let stem = truncate_at_char(base, MAX_BASENAME_BYTES - ext.len() - 1);
            format!("{stem}.{ext}")
        }
        None => truncate_at_char(base, MAX_BASENAME_BYTES).to_string(),
    }
}

/// Longest prefix of `s` of at most `max` bytes that ends on a char boundary.
fn truncate_at_char(s: &str, max: usize) -> &str {
    let mut end = max.min(s.len());
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Collision-resistant scratch name for an upload.
fn scratch_name(basename: &str) -> String {
    format!("{}_{basename}", uuid::Uuid::new_v4().simple())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_name_prefixes_token() {
        let name = scratch_name("song.wav");
        assert!(name.ends_with("_song.wav"), "got {name}");
        assert_eq!(name.len(), 32 + 1 + "song.wav".len());
    }

    #[test]
    fn basename_strips_directories() {
        assert_eq!(upload_basename("song.wav"), "song.wav");
        assert_eq!(upload_basename("../../etc/passwd"), "passwd");
        assert_eq!(upload_basename("C:\\music\\track.mp3"), "track.mp3");
    }

    #[test]
    fn basename_falls_back_for_bare_dots() {
        assert_eq!(upload_basename(".."), "upload");
        assert_eq!(upload_basename("dir/"), "upload");
    }

    #[test]
    fn scratch_names_are_unique() {
        assert_ne!(scratch_name("song.wav"), scratch_name("song.wav"));
    }

    #[test]
    fn long_basename_is_truncated_keeping_extension() {
        let long = format!("{}.wav", "a".repeat(300));
        let base = upload_basename(&long);
        assert_eq!(base.len(), MAX_BASENAME_BYTES);
        assert!(base.ends_with(".wav"), "got {base}");
    }

    #[test]
    fn long_basename_truncates_on_char_boundary() {
        let long = "é".repeat(200);
        let base = upload_basename(&long);
        assert!(base.len() <= MAX_BASENAME_BYTES);
        assert!(base.chars().all(|c| c == 'é'));
    }

    #[test]
    fn dropped_scratch_file_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        drop(ScratchFile::new(path.clone()));
        assert!(!path.exists());
    }

    #[test]
    fn kept_scratch_file_survives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.wav");
        std::fs::write(&path, b"RIFF").unwrap();

        let kept = ScratchFile::new(path.clone()).keep();
        assert_eq!(kept, path);
        assert!(path.exists());
    }
}
