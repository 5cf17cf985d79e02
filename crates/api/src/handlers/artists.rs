//! Handler for the `/artists` resource.

use axum::extract::State;
use axum::Json;
use rvc_core::models;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

/// GET /artists
///
/// List the artist model directories available for conversion.
pub async fn list_artists(State(state): State<AppState>) -> AppResult<Json<Vec<String>>> {
    let models_dir = &state.config.models_dir;
    let artists = models::list_artists(models_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to list artists: {e}")))?;

    if artists.is_empty() {
        tracing::warn!(
            models_dir = %models_dir.display(),
            "No artist model directories found; expected {}/<ArtistName>/",
            models_dir.display(),
        );
    }

    Ok(Json(artists))
}
