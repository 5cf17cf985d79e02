/// Domain-level errors raised by the job registry and other core components.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Errors produced while converting one uploaded file.
///
/// The message payload is what ends up in a failed job's `error` field, so it
/// should make sense to an end user reading the polling response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    /// A model directory, checkpoint, executable or companion script is missing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The conversion tool exists but could not be launched.
    #[error("Conversion tool unavailable: {0}")]
    Unavailable(String),

    /// The conversion tool ran and reported failure.
    #[error("Conversion failed: {0}")]
    ConversionFailed(String),

    /// A completed job's output disappeared before it was downloaded.
    #[error("Inconsistent job state: {0}")]
    InconsistentState(String),
}

impl ConvertError {
    /// Stable snake_case label, used as a structured logging field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Unavailable(_) => "unavailable",
            Self::ConversionFailed(_) => "conversion_failed",
            Self::InconsistentState(_) => "inconsistent_state",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
