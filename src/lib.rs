//! Video Summarizer - Core Library
//!
//! Downloads a video at its lowest resolution, hands it to a hosted multimodal
//! model, and returns a title plus summary. The library also carries the HTTP
//! surface and configuration shared by the server and CLI binaries.

pub mod commands;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use core::{
    config::AppConfig,
    gemini_client::{GeminiClient, RemoteAssetService},
    models::{AppError, AppResult, PipelineStage, SummaryResult, VideoRequest},
    pipeline::{DefaultPipeline, Notice, NoticeLevel, Pipeline, PipelineRunner},
    runtime::{spawn_summary_runtime, SummaryRuntimeHandle},
    video_fetcher::{VideoFetcher, VideoSource, YtDlpSource},
};

use std::sync::Arc;

/// Application state shared between HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub runtime: SummaryRuntimeHandle,
    pub yt_dlp: YtDlpSource,
}

impl AppState {
    pub fn new(config: AppConfig, runtime: SummaryRuntimeHandle, yt_dlp: YtDlpSource) -> Self {
        Self {
            config: Arc::new(config),
            runtime,
            yt_dlp,
        }
    }

    /// Wire the production pipeline; fails when the API key is missing
    pub fn from_config(config: AppConfig) -> AppResult<Self> {
        config.require_api_key()?;
        let pipeline = DefaultPipeline::from_config(&config)?;
        let yt_dlp = pipeline.fetcher().source().clone();
        let runtime = spawn_summary_runtime(
            Arc::new(pipeline),
            config.pipeline.max_concurrent_requests,
        );
        Ok(Self::new(config, runtime, yt_dlp))
    }

    /// Load the config file plus environment, falling back to defaults when invalid
    pub fn load_or_initialize_config() -> AppConfig {
        let config = AppConfig::load_with_env();
        match config.validate() {
            Ok(()) => config,
            Err(err) => {
                tracing::warn!(
                    "Invalid configuration detected ({}), falling back to defaults",
                    err
                );
                let mut default_cfg = AppConfig::default();
                default_cfg.apply_env_overrides(|key| std::env::var(key).ok());
                default_cfg
            }
        }
    }
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize logging for the library
pub fn init() -> anyhow::Result<()> {
    utils::logging::init_tracing();
    tracing::info!("📚 {} v{} initialized", NAME, VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init() {
        assert!(init().is_ok());
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
        assert_eq!(NAME, "video-summarizer");
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let mut config = AppConfig::default();
        config.gemini.api_key = None;
        let err = AppState::from_config(config).err().unwrap();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
