//! Application configuration management

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::models::{AppError, AppResult};

/// Default instruction sent alongside every uploaded video
pub const DEFAULT_SUMMARY_PROMPT: &str = "Summarize this video. List the main points as 5 bullet points, then provide a detailed summary below them.";

/// Main application configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub fetcher: FetcherConfig,
    pub pipeline: PipelineConfig,
    pub server: ServerConfig,
}

/// Remote AI service settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Never written to disk; supplied through the environment
    #[serde(skip_serializing, default)]
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub prompt: String,
    pub request_timeout_seconds: u64,
    pub user_agent: String,
}

/// Video source settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    pub yt_dlp_path: String,
    /// Directory for per-request video files; system temp dir when unset
    pub temp_directory: Option<String>,
}

/// Polling and deadline settings for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub poll_interval_seconds: u64,
    pub processing_deadline_seconds: u64,
    pub pipeline_deadline_seconds: u64,
    pub max_concurrent_requests: usize,
}

/// HTTP presentation surface settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            fetcher: FetcherConfig::default(),
            pipeline: PipelineConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            model: "gemini-1.5-pro".to_string(),
            prompt: DEFAULT_SUMMARY_PROMPT.to_string(),
            request_timeout_seconds: 600,
            user_agent: format!("VideoSummarizer/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
            temp_directory: None,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 10,
            processing_deadline_seconds: 30 * 60,
            pipeline_deadline_seconds: 60 * 60,
            max_concurrent_requests: 2,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8501".to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl FetcherConfig {
    pub fn temp_dir(&self) -> PathBuf {
        match self.temp_directory.as_deref() {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => std::env::temp_dir().join("video_summarizer"),
        }
    }
}

impl PipelineConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_seconds)
    }

    pub fn processing_deadline(&self) -> Duration {
        Duration::from_secs(self.processing_deadline_seconds)
    }

    pub fn pipeline_deadline(&self) -> Duration {
        Duration::from_secs(self.pipeline_deadline_seconds)
    }
}

impl AppConfig {
    /// Load configuration from file, creating default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file: {:?}", config_path))?;

            let config: AppConfig =
                serde_json::from_str(&content).with_context(|| "Failed to parse config file")?;

            tracing::info!("Loaded configuration from: {:?}", config_path);
            Ok(config)
        } else {
            let config = Self::default();
            config.save()?;
            tracing::info!("Created default configuration at: {:?}", config_path);
            Ok(config)
        }
    }

    /// Populate the process environment from a `.env` file in the working
    /// directory or one of its parents. Variables already set win.
    pub fn load_dotenv() -> Result<Option<PathBuf>> {
        match dotenvy::dotenv() {
            Ok(path) => Ok(Some(path)),
            Err(err) if err.not_found() => Ok(None),
            Err(err) => Err(err).with_context(|| "Failed to read .env file"),
        }
    }

    /// Load from disk, falling back to defaults, then apply the environment
    pub fn load_with_env() -> Self {
        let mut config = match Self::load() {
            Ok(cfg) => cfg,
            Err(err) => {
                tracing::warn!(
                    "Failed to load configuration from disk: {}. Using defaults",
                    err
                );
                Self::default()
            }
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::get_config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = self.export()?;

        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        tracing::info!("Saved configuration to: {:?}", config_path);
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let project_dirs = ProjectDirs::from("com", "videosummarizer", "summarizer")
            .with_context(|| "Failed to get project directories")?;

        Ok(project_dirs.config_dir().join("config.json"))
    }

    /// Export configuration as JSON string (API key excluded)
    pub fn export(&self) -> Result<String> {
        serde_json::to_string_pretty(self).with_context(|| "Failed to export configuration")
    }

    /// Parse and validate configuration from a JSON string
    pub fn import(json: &str) -> Result<Self> {
        let config: AppConfig =
            serde_json::from_str(json).with_context(|| "Failed to parse imported configuration")?;

        config
            .validate()
            .with_context(|| "Imported configuration is invalid")?;

        Ok(config)
    }

    /// Apply environment overrides through `lookup` so tests need not touch the process env
    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = non_empty("GOOGLE_API_KEY").or_else(|| non_empty("GEMINI_API_KEY")) {
            self.gemini.api_key = Some(key.trim().to_string());
        }
        if let Some(model) = non_empty("SUMMARIZER_MODEL") {
            self.gemini.model = model;
        }
        if let Some(bind) = non_empty("SUMMARIZER_BIND") {
            self.server.bind_address = bind;
        }
        if let Some(dir) = non_empty("SUMMARIZER_TEMP_DIR") {
            self.fetcher.temp_directory = Some(dir);
        }
        if let Some(path) = non_empty("YT_DLP_PATH") {
            self.fetcher.yt_dlp_path = path;
        }
    }

    /// The API key, or a configuration error when it is absent
    pub fn require_api_key(&self) -> AppResult<&str> {
        match self.gemini.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(AppError::Configuration(
                "GOOGLE_API_KEY is not set".to_string(),
            )),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.gemini.model.trim().is_empty() {
            anyhow::bail!("Model name must not be empty");
        }

        if self.gemini.prompt.trim().is_empty() {
            anyhow::bail!("Summary prompt must not be empty");
        }

        url::Url::parse(&self.gemini.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.gemini.base_url))?;

        if self.gemini.request_timeout_seconds == 0 || self.gemini.request_timeout_seconds > 3600
        {
            anyhow::bail!("Request timeout should be between 1 and 3600 seconds");
        }

        if self.fetcher.yt_dlp_path.trim().is_empty() {
            anyhow::bail!("yt-dlp path must not be empty");
        }

        let pipeline = &self.pipeline;
        if pipeline.poll_interval_seconds == 0 || pipeline.poll_interval_seconds > 300 {
            anyhow::bail!("Poll interval should be between 1 and 300 seconds");
        }

        if pipeline.processing_deadline_seconds < pipeline.poll_interval_seconds {
            anyhow::bail!("Processing deadline must be at least one poll interval");
        }

        if pipeline.pipeline_deadline_seconds < pipeline.processing_deadline_seconds {
            anyhow::bail!("Pipeline deadline must not be shorter than the processing deadline");
        }

        if pipeline.max_concurrent_requests == 0 || pipeline.max_concurrent_requests > 8 {
            anyhow::bail!("Concurrent requests should be between 1 and 8");
        }

        self.server
            .bind_address
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid bind address: {}", self.server.bind_address))?;

        Ok(())
    }
}
