//! Summary runtime command router.
//!
//! A thin async command queue in front of the pipeline. Each submitted request
//! runs on its own task once a concurrency slot is free, and stays registered
//! until it finishes so it can be cancelled by id.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info, instrument, warn};

use crate::core::models::{AppError, AppResult, PipelineStage, SummaryResult, VideoRequest};
use crate::core::pipeline::{Notice, PipelineRunner, ProgressCallback};
use crate::core::summarizer::CancelFlag;

/// Commands understood by the runtime router.
pub enum RuntimeCommand {
    Submit {
        request: VideoRequest,
        progress: Option<ProgressCallback>,
        respond_to: oneshot::Sender<AppResult<SummaryResult>>,
    },
    Cancel {
        job_id: String,
        respond_to: oneshot::Sender<AppResult<bool>>,
    },
}

impl std::fmt::Debug for RuntimeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Submit { request, .. } => f
                .debug_struct("Submit")
                .field("job_id", &request.id)
                .field("url", &request.url)
                .finish(),
            Self::Cancel { job_id, .. } => {
                f.debug_struct("Cancel").field("job_id", job_id).finish()
            }
        }
    }
}

struct JobEntry {
    url: String,
    submitted_at: DateTime<Utc>,
    stage: PipelineStage,
    cancel: CancelFlag,
}

/// Point-in-time view of a registered job
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub id: String,
    pub url: String,
    pub stage: PipelineStage,
    pub submitted_at: DateTime<Utc>,
    pub cancelled: bool,
}

type JobRegistry = Arc<DashMap<String, JobEntry>>;

/// Handle exposed to the web commands and the CLI.
#[derive(Clone)]
pub struct SummaryRuntimeHandle {
    sender: mpsc::Sender<RuntimeCommand>,
    jobs: JobRegistry,
}

impl SummaryRuntimeHandle {
    async fn send_command<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<AppResult<T>>) -> RuntimeCommand,
    ) -> AppResult<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|e| AppError::Runtime(format!("Summary runtime unavailable: {}", e)))?;
        rx.await
            .map_err(|_| AppError::Runtime("Summary runtime dropped response".into()))?
    }

    /// Run `request` through the pipeline and wait for its result
    pub async fn submit(
        &self,
        request: VideoRequest,
        progress: Option<ProgressCallback>,
    ) -> AppResult<SummaryResult> {
        self.send_command(|tx| RuntimeCommand::Submit {
            request,
            progress,
            respond_to: tx,
        })
        .await
    }

    /// Request cancellation; `Ok(false)` when no such job is running
    pub async fn cancel(&self, job_id: String) -> AppResult<bool> {
        self.send_command(|tx| RuntimeCommand::Cancel {
            job_id,
            respond_to: tx,
        })
        .await
    }

    pub fn active_jobs(&self) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .jobs
            .iter()
            .map(|entry| JobSnapshot {
                id: entry.key().clone(),
                url: entry.url.clone(),
                stage: entry.stage,
                submitted_at: entry.submitted_at,
                cancelled: entry.cancel.is_cancelled(),
            })
            .collect();
        jobs.sort_by_key(|job| job.submitted_at);
        jobs
    }
}

struct Router {
    runner: Arc<dyn PipelineRunner>,
    slots: Arc<Semaphore>,
    jobs: JobRegistry,
}

/// Spawn the router loop and return a handle to it.
///
/// Runs on the current tokio runtime when there is one, otherwise on a
/// dedicated thread with its own runtime.
pub fn spawn_summary_runtime(
    runner: Arc<dyn PipelineRunner>,
    max_concurrent: usize,
) -> SummaryRuntimeHandle {
    let (tx, rx) = mpsc::channel(64);
    let jobs: JobRegistry = Arc::new(DashMap::new());

    let router = Router {
        runner,
        slots: Arc::new(Semaphore::new(max_concurrent.max(1))),
        jobs: Arc::clone(&jobs),
    };
    let router_future = router_loop(router, rx);

    match Handle::try_current() {
        Ok(handle) => {
            info!("[RUNTIME] Spawning summary router in existing tokio runtime");
            handle.spawn(router_future);
        }
        Err(_) => {
            warn!("[RUNTIME] No tokio runtime found, creating dedicated thread with new runtime");
            let spawned = std::thread::Builder::new()
                .name("summary-runtime".into())
                .spawn(move || {
                    match tokio::runtime::Builder::new_multi_thread()
                        .enable_all()
                        .thread_name("summary-runtime-worker")
                        .build()
                    {
                        Ok(runtime) => runtime.block_on(router_future),
                        Err(e) => tracing::error!("[RUNTIME] Failed to build runtime: {}", e),
                    }
                });
            if let Err(e) = spawned {
                tracing::error!("[RUNTIME] Failed to spawn runtime thread: {}", e);
            }
        }
    }

    SummaryRuntimeHandle { sender: tx, jobs }
}

async fn router_loop(router: Router, mut rx: mpsc::Receiver<RuntimeCommand>) {
    while let Some(cmd) = rx.recv().await {
        debug!("[RUNTIME] Processing command: {:?}", cmd);
        handle_command(&router, cmd);
    }
    debug!("Summary runtime channel closed, exiting router loop");
}

#[instrument(skip(router, command), fields(?command))]
fn handle_command(router: &Router, command: RuntimeCommand) {
    match command {
        RuntimeCommand::Submit {
            request,
            progress,
            respond_to,
        } => {
            let cancel = CancelFlag::new();
            match router.jobs.entry(request.id.clone()) {
                Entry::Occupied(_) => {
                    warn!("[RUNTIME_CMD] Rejecting duplicate job id {}", request.id);
                    let _ = respond_to.send(Err(AppError::JobAlreadyRunning(request.id)));
                    return;
                }
                Entry::Vacant(slot) => {
                    slot.insert(JobEntry {
                        url: request.url.clone(),
                        submitted_at: request.created_at,
                        stage: PipelineStage::Idle,
                        cancel: cancel.clone(),
                    });
                }
            }

            let runner = Arc::clone(&router.runner);
            let slots = Arc::clone(&router.slots);
            let jobs = Arc::clone(&router.jobs);
            tokio::spawn(async move {
                let result =
                    run_job(runner, slots, &jobs, &request, cancel.clone(), progress).await;
                jobs.remove_if(&request.id, |_, entry| entry.cancel.same_flag(&cancel));
                debug!(
                    "[RUNTIME_CMD] Job {} finished, success: {}",
                    request.id,
                    result.is_ok()
                );
                let _ = respond_to.send(result);
            });
        }
        RuntimeCommand::Cancel { job_id, respond_to } => {
            let found = match router.jobs.get(&job_id) {
                Some(entry) => {
                    entry.cancel.cancel();
                    info!("[RUNTIME_CMD] Cancellation requested for job {}", job_id);
                    true
                }
                None => false,
            };
            let _ = respond_to.send(Ok(found));
        }
    }
}

async fn run_job(
    runner: Arc<dyn PipelineRunner>,
    slots: Arc<Semaphore>,
    jobs: &JobRegistry,
    request: &VideoRequest,
    cancel: CancelFlag,
    progress: Option<ProgressCallback>,
) -> AppResult<SummaryResult> {
    let _permit = slots
        .acquire_owned()
        .await
        .map_err(|_| AppError::Runtime("Summary runtime is shutting down".into()))?;
    cancel.check()?;

    let tracked: ProgressCallback = {
        let jobs = Arc::clone(jobs);
        let job_id = request.id.clone();
        Arc::new(move |notice: &Notice| {
            if let Some(mut entry) = jobs.get_mut(&job_id) {
                entry.stage = notice.stage;
            }
            if let Some(callback) = &progress {
                callback(notice);
            }
        })
    };

    runner.run(request, &cancel, Some(tracked)).await
}
