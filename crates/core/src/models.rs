//! Artist model discovery.
//!
//! Models are organised as one directory per artist under a models root:
//!
//! ```text
//! models/
//!   ArtistX/
//!     ArtistX.pth        checkpoint (required)
//!     added_IVF.index    feature index (optional)
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::error::ConvertError;

/// Extension of the primary model checkpoint.
pub const CHECKPOINT_EXTENSION: &str = "pth";

/// Extension of the optional feature index.
pub const INDEX_EXTENSION: &str = "index";

/// Model files resolved for one artist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtistModel {
    pub checkpoint: PathBuf,
    pub index: Option<PathBuf>,
}

/// List artist names (sub-directory names of `models_dir`), sorted.
///
/// A missing models root is treated as "no artists".
pub async fn list_artists(models_dir: &Path) -> io::Result<Vec<String>> {
    let mut entries = match tokio::fs::read_dir(models_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut artists = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_dir() {
            artists.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    artists.sort();
    Ok(artists)
}

/// Resolve the checkpoint and optional index for `artist`.
///
/// When several files share an extension the first one in file-name order
/// wins; the conversion tool only accepts one of each.
pub async fn resolve_model(models_dir: &Path, artist: &str) -> Result<ArtistModel, ConvertError> {
    if !is_valid_artist_name(artist) {
        return Err(ConvertError::NotFound(format!(
            "Invalid artist name: {artist:?}"
        )));
    }

    let model_dir = models_dir.join(artist);
    let mut entries = tokio::fs::read_dir(&model_dir).await.map_err(|e| {
        ConvertError::NotFound(format!(
            "Model directory {} is not readable: {e}",
            model_dir.display()
        ))
    })?;

    let mut files = Vec::new();
    loop {
        match entries.next_entry().await {
            Ok(Some(entry)) => {
                let path = entry.path();
                let is_file = tokio::fs::metadata(&path)
                    .await
                    .is_ok_and(|m| m.is_file());
                if is_file {
                    files.push(path);
                }
            }
            Ok(None) => break,
            Err(e) => {
                return Err(ConvertError::NotFound(format!(
                    "Failed to list model directory {}: {e}",
                    model_dir.display()
                )))
            }
        }
    }
    files.sort();

    let checkpoint = first_with_extension(&files, CHECKPOINT_EXTENSION).ok_or_else(|| {
        ConvertError::NotFound(format!(
            "No .{CHECKPOINT_EXTENSION} model file found in {}",
            model_dir.display()
        ))
    })?;
    let index = first_with_extension(&files, INDEX_EXTENSION);

    Ok(ArtistModel { checkpoint, index })
}

/// An artist selector must name exactly one directory below the models root.
pub fn is_valid_artist_name(artist: &str) -> bool {
    !artist.is_empty()
        && artist != "."
        && artist != ".."
        && !artist.contains(['/', '\\'])
}

fn first_with_extension(files: &[PathBuf], extension: &str) -> Option<PathBuf> {
    files
        .iter()
        .find(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
        })
        .cloned()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
