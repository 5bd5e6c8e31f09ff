//! Core data models for the video summarizer

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A single summarization request submitted by the presentation surface

#[derive(Debug, Clone, Serialize, Deserialize)]

pub struct VideoRequest {
    pub id: String,

    pub url: String,

    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl VideoRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            url: url.into(),
            created_at: chrono::Utc::now(),
        }
    }

    /// Request with a caller-chosen id, so it can be cancelled while running
    pub fn with_id(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::new(url)
        }
    }
}

/// Video downloaded to local disk for the duration of one request

#[derive(Debug, Clone, Serialize, Deserialize)]

pub struct LocalVideoFile {
    pub path: PathBuf,

    pub title: String,

    pub mime_type: String,
}

/// Lifecycle marker of an uploaded asset on the remote service

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssetState {
    #[serde(alias = "STATE_UNSPECIFIED")]
    Unspecified,

    Processing,

    /// Ready for content generation
    Active,

    Failed,
}

impl AssetState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Active | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unspecified => "STATE_UNSPECIFIED",
            Self::Processing => "PROCESSING",
            Self::Active => "ACTIVE",
            Self::Failed => "FAILED",
        }
    }
}

impl Default for AssetState {
    fn default() -> Self {
        Self::Unspecified
    }
}

impl std::fmt::Display for AssetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handle to an uploaded video on the remote AI service

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVideoAsset {
    /// Resource name, e.g. `files/abc123`
    pub name: String,

    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub mime_type: String,

    #[serde(default)]
    pub state: AssetState,

    #[serde(default)]
    pub display_name: Option<String>,
}

/// Final output of one successful pipeline run

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]

pub struct SummaryResult {
    pub title: String,

    pub text: String,
}

/// Pipeline progress state machine

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,

    Fetching,

    Uploading,

    Polling,

    Generating,

    CleaningUp,

    Done,

    Failed,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Fetching => "fetching",
            Self::Uploading => "uploading",
            Self::Polling => "polling",
            Self::Generating => "generating",
            Self::CleaningUp => "cleaning up",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// One quality/format variant offered by the video source

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]

pub struct StreamFormat {
    pub format_id: String,

    pub ext: String,

    pub width: Option<u32>,

    pub height: Option<u32>,

    pub vcodec: Option<String>,

    pub acodec: Option<String>,

    pub filesize: Option<u64>,
}

impl StreamFormat {
    pub fn has_video(&self) -> bool {
        codec_present(&self.vcodec)
    }

    pub fn has_audio(&self) -> bool {
        codec_present(&self.acodec)
    }

    /// Video and audio muxed into a single stream
    pub fn is_progressive(&self) -> bool {
        self.has_video() && self.has_audio()
    }
}

fn codec_present(codec: &Option<String>) -> bool {
    matches!(codec.as_deref(), Some(c) if !c.is_empty() && c != "none")
}

/// Resolved metadata for a video URL

#[derive(Debug, Clone, Serialize, Deserialize)]

pub struct VideoMetadata {
    pub id: String,

    pub title: String,

    pub webpage_url: String,

    pub duration: Option<u64>,

    pub formats: Vec<StreamFormat>,
}

/// Application error types

#[derive(Debug, thiserror::Error)]

pub enum AppError {
    #[error("Could not resolve video: {0}")]
    Resolution(String),

    #[error("Video download failed: {0}")]
    Fetch(String),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Remote processing failed with state {state}")]
    RemoteProcessing { state: AssetState },

    #[error("Summary generation failed: {0}")]
    Generation(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Request was cancelled")]
    Cancelled,

    #[error("Job {0} is already running")]
    JobAlreadyRunning(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("Deadline exceeded while {stage}")]
    DeadlineExceeded { stage: PipelineStage },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

impl AppError {
    /// Stage this error aborts, when it is tied to one
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Resolution(_) | Self::Fetch(_) => Some(PipelineStage::Fetching),
            Self::Upload(_) => Some(PipelineStage::Uploading),
            Self::RemoteProcessing { .. } => Some(PipelineStage::Polling),
            Self::Generation(_) => Some(PipelineStage::Generating),
            Self::DeadlineExceeded { stage } => Some(*stage),
            _ => None,
        }
    }
}

/// Result type alias for application operations

pub type AppResult<T> = Result<T, AppError>;
