//! Subprocess-backed [`Converter`].
//!
//! Builds the command line for the external inference script and runs it:
//!
//! ```text
//! <interpreter> <script> --input <in> --output <out> --model <ckpt> --pitch rmvpe [--index <idx>]
//! ```
//!
//! Each call writes to `<outputs_dir>/<uuid>/out.wav`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;

use super::subprocess;
use super::Converter;
use crate::error::ConvertError;
use crate::models;

/// Script looked up next to the interpreter when none is configured.
pub const DEFAULT_SCRIPT_NAME: &str = "rvc_infer.py";

/// Pitch extraction method passed to the tool.
pub const DEFAULT_PITCH_METHOD: &str = "rmvpe";

/// File name of the converted audio inside its output directory.
pub const OUTPUT_FILE_NAME: &str = "out.wav";

/// Locations and tool settings for [`ConversionInvoker`].
#[derive(Debug, Clone)]
pub struct InvokerConfig {
    /// Root of the per-artist model directories.
    pub models_dir: PathBuf,
    /// Root under which each conversion gets its own directory.
    pub outputs_dir: PathBuf,
    /// Interpreter (or executable) that runs the inference script.
    pub interpreter: PathBuf,
    /// Inference script; `None` means [`DEFAULT_SCRIPT_NAME`] beside the interpreter.
    pub script: Option<PathBuf>,
    pub pitch_method: String,
}

impl InvokerConfig {
    /// Resolved path of the inference script.
    pub fn script_path(&self) -> PathBuf {
        match &self.script {
            Some(script) => script.clone(),
            None => self
                .interpreter
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join(DEFAULT_SCRIPT_NAME),
        }
    }
}

/// Everything needed to run the tool once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionRequest {
    pub input: PathBuf,
    pub artist: String,
    pub checkpoint: PathBuf,
    pub index: Option<PathBuf>,
    pub output: PathBuf,
}

impl ConversionRequest {
    /// Arguments passed after the script path.
    pub fn args(&self, pitch_method: &str) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--input".into(),
            self.input.clone().into(),
            "--output".into(),
            self.output.clone().into(),
            "--model".into(),
            self.checkpoint.clone().into(),
            "--pitch".into(),
            pitch_method.into(),
        ];
        if let Some(index) = &self.index {
            args.push("--index".into());
            args.push(index.clone().into());
        }
        args
    }
}

/// Runs the external voice-conversion tool.
pub struct ConversionInvoker {
    config: InvokerConfig,
}

impl ConversionInvoker {
    pub fn new(config: InvokerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Validate inputs and allocate a fresh output directory.
    ///
    /// Nothing is created on disk unless every check passes.
    pub async fn prepare(&self, input: &Path, artist: &str) -> Result<ConversionRequest, ConvertError> {
        if !tokio::fs::try_exists(input).await.unwrap_or(false) {
            return Err(ConvertError::NotFound(format!(
                "Input file not found: {}",
                input.display()
            )));
        }

        let model = models::resolve_model(&self.config.models_dir, artist).await?;
        self.check_tool().await?;

        let out_dir = self
            .config
            .outputs_dir
            .join(uuid::Uuid::new_v4().simple().to_string());
        tokio::fs::create_dir_all(&out_dir).await.map_err(|e| {
            ConvertError::Unavailable(format!(
                "Failed to create output directory {}: {e}",
                out_dir.display()
            ))
        })?;

        Ok(ConversionRequest {
            input: input.to_path_buf(),
            artist: artist.to_string(),
            checkpoint: model.checkpoint,
            index: model.index,
            output: out_dir.join(OUTPUT_FILE_NAME),
        })
    }

    /// Run the tool for a prepared request and verify it produced output.
    pub async fn execute(&self, request: &ConversionRequest) -> Result<PathBuf, ConvertError> {
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(self.config.script_path())
            .args(request.args(&self.config.pitch_method));

        tracing::info!(
            artist = %request.artist,
            input = %request.input.display(),
            output = %request.output.display(),
            checkpoint = %request.checkpoint.display(),
            index = ?request.index,
            "Executing conversion tool",
        );

        let output = subprocess::run_command(&mut cmd).await.map_err(|e| {
            ConvertError::Unavailable(format!(
                "Could not launch {} with {}: {e}",
                self.config.interpreter.display(),
                self.config.script_path().display()
            ))
        })?;

        tracing::debug!(
            exit_code = output.exit_code,
            duration_ms = output.duration_ms,
            stdout = %output.stdout,
            stderr = %output.stderr,
            "Conversion tool finished",
        );

        if !output.success() {
            return Err(ConvertError::ConversionFailed(format!(
                "tool exited with code {}: {}",
                output.exit_code,
                output.diagnostics()
            )));
        }

        if !tokio::fs::try_exists(&request.output).await.unwrap_or(false) {
            return Err(ConvertError::ConversionFailed(format!(
                "tool exited successfully but produced no output at {}",
                request.output.display()
            )));
        }

        Ok(request.output.clone())
    }

    /// Check that the interpreter is runnable and the script exists.
    async fn check_tool(&self) -> Result<(), ConvertError> {
        let interpreter = &self.config.interpreter;
        let metadata = tokio::fs::metadata(interpreter).await.map_err(|_| {
            ConvertError::NotFound(format!(
                "Conversion executable not found: {}",
                interpreter.display()
            ))
        })?;

        if !metadata.is_file() {
            return Err(ConvertError::NotFound(format!(
                "Conversion executable is not a file: {}",
                interpreter.display()
            )));
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let mode = metadata.permissions().mode();
            if mode & 0o111 == 0 {
                return Err(ConvertError::Unavailable(format!(
                    "{} is not executable (mode {mode:#o})",
                    interpreter.display()
                )));
            }
        }

        let script = self.config.script_path();
        let script_is_file = tokio::fs::metadata(&script)
            .await
            .is_ok_and(|m| m.is_file());
        if !script_is_file {
            return Err(ConvertError::NotFound(format!(
                "Conversion script not found: {}",
                script.display()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl Converter for ConversionInvoker {
    async fn convert(&self, input: &Path, artist: &str) -> Result<PathBuf, ConvertError> {
        let request = self.prepare(input, artist).await?;

        match self.execute(&request).await {
            Ok(path) => Ok(path),
            Err(e) => {
                if let Some(out_dir) = request.output.parent() {
                    if let Err(rm_err) = tokio::fs::remove_dir_all(out_dir).await {
                        tracing::warn!(
                            path = %out_dir.display(),
                            error = %rm_err,
                            "Failed to remove output directory of failed conversion",
                        );
                    }
                }
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
