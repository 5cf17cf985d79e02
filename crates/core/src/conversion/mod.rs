//! Conversion of one uploaded file through the external voice-conversion tool.
//!
//! [`Converter`] is the seam the job runner depends on. The production
//! implementation is [`invoker::ConversionInvoker`], which spawns the tool as
//! a subprocess; tests substitute their own.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::ConvertError;

pub mod invoker;
pub mod subprocess;

/// Converts an input audio file using the named artist model.
#[async_trait]
pub trait Converter: Send + Sync {
    /// Convert `input` with `artist`'s model and return the produced file.
    ///
    /// Every call writes to a fresh location; concurrent calls never share an
    /// output path.
    async fn convert(&self, input: &Path, artist: &str) -> Result<PathBuf, ConvertError>;
}
