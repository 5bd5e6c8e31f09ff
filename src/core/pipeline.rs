//! Pipeline orchestrator
//!
//! Sequences fetch → upload → poll → generate → cleanup for one request.
//! The local video file and the uploaded remote asset are released on every
//! exit path, and cleanup failures are reported as warnings rather than errors.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::core::config::AppConfig;
use crate::core::gemini_client::{GeminiClient, RemoteAssetService};
use crate::core::models::{AppResult, LocalVideoFile, PipelineStage, SummaryResult, VideoRequest};
use crate::core::summarizer::{CancelFlag, SummarizeEvent, Summarizer, SummarizerOptions};
use crate::core::video_fetcher::{VideoFetcher, VideoSource, YtDlpSource};
use crate::utils::file_utils::TempVideoFile;

/// Severity of a progress notice shown to the user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Progress or result message emitted while a request runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub stage: PipelineStage,
    pub message: String,
    pub at: chrono::DateTime<chrono::Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, stage: PipelineStage, message: impl Into<String>) -> Self {
        Self {
            level,
            stage,
            message: message.into(),
            at: chrono::Utc::now(),
        }
    }
}

/// Progress callback type for pipeline runs
pub type ProgressCallback = Arc<dyn Fn(&Notice) + Send + Sync>;

/// Collects notices so they can be returned with the final result
#[derive(Clone, Default)]
pub struct NoticeLog {
    notices: Arc<Mutex<Vec<Notice>>>,
}

impl NoticeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn callback(&self) -> ProgressCallback {
        let notices = Arc::clone(&self.notices);
        Arc::new(move |notice: &Notice| notices.lock().push(notice.clone()))
    }

    pub fn snapshot(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }
}

/// Anything that can run one summarization request end to end
#[async_trait]
pub trait PipelineRunner: Send + Sync + 'static {
    async fn run(
        &self,
        request: &VideoRequest,
        cancel: &CancelFlag,
        progress: Option<ProgressCallback>,
    ) -> AppResult<SummaryResult>;
}

/// Tracks the current stage and forwards notices to the callback and the log
struct StageReporter {
    request_id: String,
    stage: Mutex<PipelineStage>,
    progress: Option<ProgressCallback>,
}

impl StageReporter {
    fn new(request_id: &str, progress: Option<ProgressCallback>) -> Self {
        Self {
            request_id: request_id.to_string(),
            stage: Mutex::new(PipelineStage::Idle),
            progress,
        }
    }

    fn stage(&self) -> PipelineStage {
        *self.stage.lock()
    }

    fn enter(&self, stage: PipelineStage, message: impl Into<String>) {
        *self.stage.lock() = stage;
        debug!("[{}] stage -> {}", self.request_id, stage);
        self.emit(NoticeLevel::Info, message);
    }

    fn emit(&self, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice::new(level, self.stage(), message);
        match level {
            NoticeLevel::Warning => warn!("[{}] {}", self.request_id, notice.message),
            NoticeLevel::Error => error!("[{}] {}", self.request_id, notice.message),
            _ => info!("[{}] {}", self.request_id, notice.message),
        }
        if let Some(callback) = &self.progress {
            callback(&notice);
        }
    }
}

pub struct Pipeline<V, S> {
    fetcher: VideoFetcher<V>,
    summarizer: Summarizer<S>,
    temp_dir: PathBuf,
    /// Overall bound on upload + poll + generate
    deadline: Duration,
}

/// Pipeline wired to yt-dlp and Gemini
pub type DefaultPipeline = Pipeline<YtDlpSource, GeminiClient>;

impl DefaultPipeline {
    /// Build the production pipeline from explicit configuration
    pub fn from_config(config: &AppConfig) -> AppResult<Self> {
        let client = GeminiClient::new(&config.gemini)?;
        Ok(Pipeline::new(
            VideoFetcher::new(YtDlpSource::new(config.fetcher.yt_dlp_path.clone())),
            Summarizer::new(client, SummarizerOptions::from_config(config)),
            config.fetcher.temp_dir(),
            config.pipeline.pipeline_deadline(),
        ))
    }
}

impl<V: VideoSource, S: RemoteAssetService> Pipeline<V, S> {
    pub fn new(
        fetcher: VideoFetcher<V>,
        summarizer: Summarizer<S>,
        temp_dir: PathBuf,
        deadline: Duration,
    ) -> Self {
        Self {
            fetcher,
            summarizer,
            temp_dir,
            deadline,
        }
    }

    pub fn fetcher(&self) -> &VideoFetcher<V> {
        &self.fetcher
    }

    pub async fn execute(
        &self,
        request: &VideoRequest,
        cancel: &CancelFlag,
        progress: Option<ProgressCallback>,
    ) -> AppResult<SummaryResult> {
        let reporter = StageReporter::new(&request.id, progress);
        let local = TempVideoFile::for_request(&self.temp_dir, &request.id);

        let outcome = self.process(request, cancel, &reporter, &local).await;

        // Remote cleanup already ran inside the summarizer when anything was uploaded
        if reporter.stage() != PipelineStage::CleaningUp {
            reporter.enter(PipelineStage::CleaningUp, stage_message(PipelineStage::CleaningUp));
        }
        let local_path = local.path().to_path_buf();
        match local.remove().await {
            Ok(removed) => debug!("Local file {} removed: {}", local_path.display(), removed),
            Err(e) => reporter.emit(
                NoticeLevel::Warning,
                format!("Could not delete {}: {}", local_path.display(), e),
            ),
        }

        match outcome {
            Ok(result) => {
                *reporter.stage.lock() = PipelineStage::Done;
                reporter.emit(NoticeLevel::Success, "Summary complete");
                Ok(result)
            }
            Err(e) => {
                *reporter.stage.lock() = PipelineStage::Failed;
                reporter.emit(NoticeLevel::Error, format!("Failed to summarize video: {}", e));
                Err(e)
            }
        }
    }

    async fn process(
        &self,
        request: &VideoRequest,
        cancel: &CancelFlag,
        reporter: &StageReporter,
        local: &TempVideoFile,
    ) -> AppResult<SummaryResult> {
        cancel.check()?;

        reporter.enter(PipelineStage::Fetching, stage_message(PipelineStage::Fetching));
        let file: LocalVideoFile = self.fetcher.fetch(&request.url, local.path()).await?;
        reporter.emit(NoticeLevel::Info, format!("Title: {}", file.title));

        cancel.check()?;
        let text = self
            .summarizer
            .summarize(&file, cancel, self.deadline, |event| match event {
                SummarizeEvent::Stage(stage) => reporter.enter(stage, stage_message(stage)),
                SummarizeEvent::ReleaseFailed { name, error } => reporter.emit(
                    NoticeLevel::Warning,
                    format!("Could not delete remote asset {}: {}", name, error),
                ),
            })
            .await?;

        Ok(SummaryResult {
            title: file.title,
            text,
        })
    }
}

fn stage_message(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Fetching => "Downloading video",
        PipelineStage::Uploading => "Uploading video to the AI service",
        PipelineStage::Polling => "Waiting for the video to be processed",
        PipelineStage::Generating => "AI model is analyzing the video",
        PipelineStage::CleaningUp => "Deleting temporary files",
        _ => "Working",
    }
}

#[async_trait]
impl<V, S> PipelineRunner for Pipeline<V, S>
where
    V: VideoSource + 'static,
    S: RemoteAssetService + 'static,
{
    async fn run(
        &self,
        request: &VideoRequest,
        cancel: &CancelFlag,
        progress: Option<ProgressCallback>,
    ) -> AppResult<SummaryResult> {
        self.execute(request, cancel, progress).await
    }
}
