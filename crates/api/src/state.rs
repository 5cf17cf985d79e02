use std::sync::Arc;

use rvc_core::conversion::invoker::ConversionInvoker;
use rvc_core::conversion::Converter;
use rvc_core::registry::JobRegistry;
use rvc_core::runner::JobRunner;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (directories, limits).
    pub config: Arc<ServerConfig>,
    /// All jobs submitted since startup.
    pub registry: Arc<JobRegistry>,
    /// Background executor for conversion jobs.
    pub runner: JobRunner,
}

impl AppState {
    /// Build state backed by the external conversion tool from `config`.
    pub fn new(config: ServerConfig) -> Self {
        let converter = Arc::new(ConversionInvoker::new(config.invoker_config()));
        Self::with_converter(config, converter)
    }

    /// Build state around any [`Converter`] implementation.
    pub fn with_converter(config: ServerConfig, converter: Arc<dyn Converter>) -> Self {
        let registry = Arc::new(JobRegistry::new());
        let runner = JobRunner::new(Arc::clone(&registry), converter);
        Self {
            config: Arc::new(config),
            registry,
            runner,
        }
    }
}
