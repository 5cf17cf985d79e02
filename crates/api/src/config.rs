use std::path::PathBuf;

use rvc_core::conversion::invoker::{InvokerConfig, DEFAULT_PITCH_METHOD};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running from the project directory.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `120`). Covers upload time.
    pub request_timeout_secs: u64,
    /// How long shutdown waits for in-flight conversions (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Largest accepted request body in bytes (default: 100 MiB).
    pub max_upload_bytes: usize,
    /// Per-artist model directories.
    pub models_dir: PathBuf,
    /// Scratch directory for uploads awaiting conversion.
    pub uploads_dir: PathBuf,
    /// Root of the per-conversion output directories.
    pub outputs_dir: PathBuf,
    /// Pre-built front-end served at `/`.
    pub static_dir: PathBuf,
    /// Interpreter that runs the inference script.
    pub rvc_python: PathBuf,
    /// Inference script; defaults to `rvc_infer.py` beside `rvc_python`.
    pub rvc_script: Option<PathBuf>,
    pub pitch_method: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                   |
    /// |-------------------------|---------------------------|
    /// | `HOST`                  | `0.0.0.0`                 |
    /// | `PORT`                  | `8000`                    |
    /// | `CORS_ORIGINS`          | `http://localhost:8000`   |
    /// | `REQUEST_TIMEOUT_SECS`  | `120`                     |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                      |
    /// | `MAX_UPLOAD_BYTES`      | `104857600`               |
    /// | `MODELS_DIR`            | `models`                  |
    /// | `UPLOADS_DIR`           | `uploads`                 |
    /// | `OUTPUTS_DIR`           | `outputs`                 |
    /// | `STATIC_DIR`            | `static`                  |
    /// | `RVC_PYTHON`            | `.venv/bin/python`        |
    /// | `RVC_SCRIPT`            | (beside `RVC_PYTHON`)     |
    /// | `RVC_PITCH_METHOD`      | `rmvpe`                   |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "8000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:8000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "120".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let max_upload_bytes: usize = std::env::var("MAX_UPLOAD_BYTES")
            .unwrap_or_else(|_| (100 * 1024 * 1024).to_string())
            .parse()
            .expect("MAX_UPLOAD_BYTES must be a valid usize");

        let path_var = |key: &str, default: &str| -> PathBuf {
            std::env::var(key).unwrap_or_else(|_| default.into()).into()
        };

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            shutdown_timeout_secs,
            max_upload_bytes,
            models_dir: path_var("MODELS_DIR", "models"),
            uploads_dir: path_var("UPLOADS_DIR", "uploads"),
            outputs_dir: path_var("OUTPUTS_DIR", "outputs"),
            static_dir: path_var("STATIC_DIR", "static"),
            rvc_python: path_var("RVC_PYTHON", ".venv/bin/python"),
            rvc_script: std::env::var("RVC_SCRIPT").ok().map(PathBuf::from),
            pitch_method: std::env::var("RVC_PITCH_METHOD")
                .unwrap_or_else(|_| DEFAULT_PITCH_METHOD.into()),
        }
    }

    /// Settings for the conversion invoker.
    pub fn invoker_config(&self) -> InvokerConfig {
        InvokerConfig {
            models_dir: self.models_dir.clone(),
            outputs_dir: self.outputs_dir.clone(),
            interpreter: self.rvc_python.clone(),
            script: self.rvc_script.clone(),
            pitch_method: self.pitch_method.clone(),
        }
    }

    /// Create the models, uploads, outputs and static directories if missing.
    pub async fn ensure_directories(&self) -> std::io::Result<()> {
        for dir in [
            &self.models_dir,
            &self.uploads_dir,
            &self.outputs_dir,
            &self.static_dir,
        ] {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }
}
