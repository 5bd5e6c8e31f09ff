//! Summarization client
//!
//! Uploads a local video to the remote service, waits until the uploaded
//! asset leaves the processing state, and requests a summary for it.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout_at};
use tracing::{debug, info, warn};

use crate::core::config::AppConfig;
use crate::core::gemini_client::RemoteAssetService;
use crate::core::models::{
    AppError, AppResult, AssetState, LocalVideoFile, PipelineStage, RemoteVideoAsset,
};

/// Shared cancellation flag, checked between remote calls
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// True when both handles share the same underlying flag
    pub fn same_flag(&self, other: &CancelFlag) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn check(&self) -> AppResult<()> {
        if self.is_cancelled() {
            Err(AppError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Tunables for one summarization
#[derive(Debug, Clone)]
pub struct SummarizerOptions {
    pub prompt: String,
    pub poll_interval: Duration,
    /// Upper bound on time spent waiting for remote processing
    pub processing_deadline: Duration,
    /// Timeout for the generation request
    pub request_timeout: Duration,
}

impl SummarizerOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            prompt: config.gemini.prompt.clone(),
            poll_interval: config.pipeline.poll_interval(),
            processing_deadline: config.pipeline.processing_deadline(),
            request_timeout: config.gemini.request_timeout(),
        }
    }
}

impl Default for SummarizerOptions {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Progress reported by [`Summarizer::summarize`]
#[derive(Debug, Clone, PartialEq)]
pub enum SummarizeEvent {
    Stage(PipelineStage),
    /// The uploaded asset could not be deleted; the summary is unaffected
    ReleaseFailed { name: String, error: String },
}

/// Asset that reached a terminal ready state, and how many polls it took
#[derive(Debug, Clone)]
pub struct ReadyAsset {
    pub asset: RemoteVideoAsset,
    pub polls: u32,
}

pub struct Summarizer<S> {
    service: S,
    options: SummarizerOptions,
}

impl<S: RemoteAssetService> Summarizer<S> {
    pub fn new(service: S, options: SummarizerOptions) -> Self {
        Self { service, options }
    }

    pub async fn upload(&self, file: &LocalVideoFile) -> AppResult<RemoteVideoAsset> {
        self.service.upload(file).await
    }

    /// Poll until the asset is no longer processing.
    ///
    /// Returns [`AppError::RemoteProcessing`] when the asset ends up FAILED and
    /// [`AppError::DeadlineExceeded`] once the processing deadline passes.
    pub async fn wait_until_ready(
        &self,
        asset: RemoteVideoAsset,
        cancel: &CancelFlag,
    ) -> AppResult<ReadyAsset> {
        let started = Instant::now();
        let mut current = asset;
        let mut polls = 0u32;

        while !current.state.is_terminal() {
            cancel.check()?;

            if started.elapsed() >= self.options.processing_deadline {
                warn!(
                    "Asset {} still {} after {:?}",
                    current.name, current.state, self.options.processing_deadline
                );
                return Err(AppError::DeadlineExceeded {
                    stage: PipelineStage::Polling,
                });
            }

            debug!("⏳ {} is {}, polling again", current.name, current.state);
            sleep(self.options.poll_interval).await;

            current = self.service.get_status(&current.name).await?;
            polls += 1;
        }

        if current.state == AssetState::Failed {
            return Err(AppError::RemoteProcessing {
                state: current.state,
            });
        }

        info!("Asset {} ready after {} polls", current.name, polls);
        Ok(ReadyAsset {
            asset: current,
            polls,
        })
    }

    pub async fn generate(
        &self,
        asset: &RemoteVideoAsset,
        cancel: &CancelFlag,
    ) -> AppResult<String> {
        cancel.check()?;
        info!("🤖 Generating summary for {}", asset.name);
        self.service
            .generate(asset, &self.options.prompt, self.options.request_timeout)
            .await
    }

    /// Delete the remote asset; failures are logged and returned
    pub async fn release(&self, asset: &RemoteVideoAsset) -> AppResult<()> {
        match self.service.delete(&asset.name).await {
            Ok(()) => {
                debug!("Released remote asset {}", asset.name);
                Ok(())
            }
            Err(e) => {
                warn!("Failed to delete remote asset {}: {}", asset.name, e);
                Err(e)
            }
        }
    }

    /// Upload, wait, generate, and always release the uploaded asset.
    ///
    /// `deadline` bounds everything up to the generated text. Release runs
    /// after it expires too, so a timed out asset is still deleted.
    pub async fn summarize<F>(
        &self,
        file: &LocalVideoFile,
        cancel: &CancelFlag,
        deadline: Duration,
        on_event: F,
    ) -> AppResult<String>
    where
        F: Fn(SummarizeEvent) + Send + Sync,
    {
        let deadline_at = tokio::time::Instant::now() + deadline;
        let stage = Mutex::new(PipelineStage::Uploading);
        let enter = |next: PipelineStage| {
            *stage.lock() = next;
            on_event(SummarizeEvent::Stage(next));
        };
        let expired = || AppError::DeadlineExceeded {
            stage: *stage.lock(),
        };

        enter(PipelineStage::Uploading);
        let asset = timeout_at(deadline_at, self.upload(file))
            .await
            .map_err(|_| expired())??;

        let outcome = timeout_at(deadline_at, async {
            enter(PipelineStage::Polling);
            let ready = self.wait_until_ready(asset.clone(), cancel).await?;

            enter(PipelineStage::Generating);
            self.generate(&ready.asset, cancel).await
        })
        .await
        .unwrap_or_else(|_| Err(expired()));

        enter(PipelineStage::CleaningUp);
        if let Err(e) = self.release(&asset).await {
            on_event(SummarizeEvent::ReleaseFailed {
                name: asset.name.clone(),
                error: e.to_string(),
            });
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::PathBuf;
    use std::sync::atomic::AtomicUsize;

    /// Scripted remote service: `upload` returns the first state, each
    /// `get_status` pops the next one (repeating the last when exhausted).
    #[derive(Default)]
    struct ScriptedService {
        states: Mutex<VecDeque<AssetState>>,
        status_calls: AtomicUsize,
        generate_calls: AtomicUsize,
        delete_calls: AtomicUsize,
        fail_delete: AtomicBool,
        cancel_on_status: Mutex<Option<CancelFlag>>,
    }

    impl ScriptedService {
        fn with_states(states: &[AssetState]) -> Arc<Self> {
            Arc::new(Self {
                states: Mutex::new(states.iter().copied().collect()),
                ..Default::default()
            })
        }

        fn next_state(&self) -> AssetState {
            let mut states = self.states.lock();
            if states.len() > 1 {
                states.pop_front().unwrap_or(AssetState::Active)
            } else {
                states.front().copied().unwrap_or(AssetState::Active)
            }
        }

        fn asset(state: AssetState) -> RemoteVideoAsset {
            RemoteVideoAsset {
                name: "files/test".to_string(),
                uri: "https://example.test/files/test".to_string(),
                mime_type: "video/mp4".to_string(),
                state,
                display_name: None,
            }
        }
    }

    #[async_trait]
    impl RemoteAssetService for ScriptedService {
        async fn upload(&self, _file: &LocalVideoFile) -> AppResult<RemoteVideoAsset> {
            Ok(Self::asset(self.next_state()))
        }

        async fn get_status(&self, _name: &str) -> AppResult<RemoteVideoAsset> {
            self.status_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(flag) = self.cancel_on_status.lock().as_ref() {
                flag.cancel();
            }
            Ok(Self::asset(self.next_state()))
        }

        async fn generate(
            &self,
            _asset: &RemoteVideoAsset,
            prompt: &str,
            _timeout: Duration,
        ) -> AppResult<String> {
            self.generate_calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("summary for: {}", prompt))
        }

        async fn delete(&self, _name: &str) -> AppResult<()> {
            self.delete_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_delete.load(Ordering::SeqCst) {
                return Err(AppError::Io(std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "connection reset",
                )));
            }
            Ok(())
        }
    }

    fn fast_options() -> SummarizerOptions {
        SummarizerOptions {
            prompt: "five bullets".to_string(),
            poll_interval: Duration::from_millis(1),
            processing_deadline: Duration::from_secs(5),
            request_timeout: Duration::from_secs(5),
        }
    }

    const NO_DEADLINE: Duration = Duration::from_secs(60);

    fn local_file() -> LocalVideoFile {
        LocalVideoFile {
            path: PathBuf::from("/tmp/unused.mp4"),
            title: "Demo".to_string(),
            mime_type: "video/mp4".to_string(),
        }
    }

    #[tokio::test]
    async fn test_poll_count_matches_transitions() {
        use AssetState::*;
        // upload reports PROCESSING, the k-th status check reports ACTIVE
        for k in 1..=4usize {
            let mut script = vec![Processing; k];
            script.push(Active);
            let service = ScriptedService::with_states(&script);
            let summarizer = Summarizer::new(service.clone(), fast_options());

            let asset = summarizer.upload(&local_file()).await.unwrap();
            let ready = summarizer
                .wait_until_ready(asset, &CancelFlag::new())
                .await
                .unwrap();

            assert_eq!(ready.polls as usize, k);
            assert_eq!(service.status_calls.load(Ordering::SeqCst), k);
            assert_eq!(ready.asset.state, Active);
        }
    }

    #[tokio::test]
    async fn test_already_active_asset_needs_no_polls() {
        let service = ScriptedService::with_states(&[AssetState::Active]);
        let summarizer = Summarizer::new(service.clone(), fast_options());

        let asset = summarizer.upload(&local_file()).await.unwrap();
        let ready = summarizer
            .wait_until_ready(asset, &CancelFlag::new())
            .await
            .unwrap();
        assert_eq!(ready.polls, 0);
        assert_eq!(service.status_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failed_asset_skips_generation() {
        use AssetState::*;
        let service = ScriptedService::with_states(&[Processing, Processing, Failed]);
        let summarizer = Summarizer::new(service.clone(), fast_options());

        let err = summarizer
            .summarize(&local_file(), &CancelFlag::new(), NO_DEADLINE, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::RemoteProcessing { state: Failed }));
        assert_eq!(service.generate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stuck_asset_hits_processing_deadline() {
        let service = ScriptedService::with_states(&[AssetState::Processing]);
        let options = SummarizerOptions {
            processing_deadline: Duration::from_millis(20),
            ..fast_options()
        };
        let summarizer = Summarizer::new(service.clone(), options);

        let err = summarizer
            .summarize(&local_file(), &CancelFlag::new(), NO_DEADLINE, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::DeadlineExceeded {
                stage: PipelineStage::Polling
            }
        ));
        assert!(service.status_calls.load(Ordering::SeqCst) >= 1);
        assert_eq!(service.generate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_checked_in_poll_loop() {
        let service = ScriptedService::with_states(&[AssetState::Processing]);
        let cancel = CancelFlag::new();
        *service.cancel_on_status.lock() = Some(cancel.clone());
        let summarizer = Summarizer::new(service.clone(), fast_options());

        let err = summarizer
            .summarize(&local_file(), &cancel, NO_DEADLINE, |_| {})
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(service.status_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.generate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancellation_checked_before_generation() {
        let service = ScriptedService::with_states(&[AssetState::Active]);
        let summarizer = Summarizer::new(service.clone(), fast_options());
        let cancel = CancelFlag::new();
        cancel.cancel();

        let asset = summarizer.upload(&local_file()).await.unwrap();
        let err = summarizer.generate(&asset, &cancel).await.unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert_eq!(service.generate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_summarize_success_uses_prompt_and_releases() {
        let service = ScriptedService::with_states(&[AssetState::Processing, AssetState::Active]);
        let summarizer = Summarizer::new(service.clone(), fast_options());

        let text = summarizer
            .summarize(&local_file(), &CancelFlag::new(), NO_DEADLINE, |_| {})
            .await
            .unwrap();

        assert_eq!(text, "summary for: five bullets");
        assert_eq!(service.generate_calls.load(Ordering::SeqCst), 1);
        assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_summarize_reports_stages_in_order() {
        let service = ScriptedService::with_states(&[AssetState::Processing, AssetState::Active]);
        let summarizer = Summarizer::new(service.clone(), fast_options());
        let events = Mutex::new(Vec::new());

        summarizer
            .summarize(&local_file(), &CancelFlag::new(), NO_DEADLINE, |event| {
                events.lock().push(event)
            })
            .await
            .unwrap();

        assert_eq!(
            *events.lock(),
            vec![
                SummarizeEvent::Stage(PipelineStage::Uploading),
                SummarizeEvent::Stage(PipelineStage::Polling),
                SummarizeEvent::Stage(PipelineStage::Generating),
                SummarizeEvent::Stage(PipelineStage::CleaningUp),
            ]
        );
    }

    #[tokio::test]
    async fn test_overall_deadline_names_stage_and_still_releases() {
        let service = ScriptedService::with_states(&[AssetState::Processing]);
        let options = SummarizerOptions {
            poll_interval: Duration::from_millis(5),
            ..fast_options()
        };
        let summarizer = Summarizer::new(service.clone(), options);

        let err = summarizer
            .summarize(
                &local_file(),
                &CancelFlag::new(),
                Duration::from_millis(30),
                |_| {},
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AppError::DeadlineExceeded {
                stage: PipelineStage::Polling
            }
        ));
        assert_eq!(service.generate_calls.load(Ordering::SeqCst), 0);
        assert_eq!(service.delete_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_release_failure_is_reported_but_summary_kept() {
        let service = ScriptedService::with_states(&[AssetState::Active]);
        service.fail_delete.store(true, Ordering::SeqCst);
        let summarizer = Summarizer::new(service.clone(), fast_options());
        let events = Mutex::new(Vec::new());

        let text = summarizer
            .summarize(&local_file(), &CancelFlag::new(), NO_DEADLINE, |event| {
                events.lock().push(event)
            })
            .await
            .unwrap();

        assert_eq!(text, "summary for: five bullets");
        let events = events.lock();
        assert!(matches!(
            events.last(),
            Some(SummarizeEvent::ReleaseFailed { name, error })
                if name == "files/test" && error.contains("connection reset")
        ));
    }
}
