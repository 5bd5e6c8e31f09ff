//! Summarize command handlers
//!
//! Request/response endpoints behind the single-page form: submit a URL and
//! wait for the summary, or cancel a running job by id.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::core::models::{AppError, PipelineStage, VideoRequest};
use crate::core::pipeline::{Notice, NoticeLevel, NoticeLog};
use crate::core::runtime::JobSnapshot;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct SummarizeRequest {
    pub url: String,
    /// Client-chosen UUID so the job can be cancelled before it finishes
    #[serde(default)]
    pub job_id: Option<String>,
}

/// Summary pre-split for display
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SummarySections {
    pub key_points: String,
    pub details: String,
}

#[derive(Debug, Serialize)]
pub struct SummarizeResponse {
    pub job_id: Option<String>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub sections: Option<SummarySections>,
    pub notices: Vec<Notice>,
    pub error: Option<String>,
}

impl SummarizeResponse {
    fn rejected(message: &str) -> Self {
        Self {
            job_id: None,
            title: None,
            summary: None,
            sections: None,
            notices: vec![Notice::new(
                NoticeLevel::Warning,
                PipelineStage::Idle,
                message,
            )],
            error: Some(message.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: String,
    pub cancelled: bool,
}

/// Split at the first blank line into key points and details.
///
/// Without a blank line everything is treated as details.
pub fn split_summary(text: &str) -> SummarySections {
    let normalized = text.replace("\r\n", "\n");
    let lines: Vec<&str> = normalized.lines().collect();

    match lines.iter().position(|line| line.trim().is_empty()) {
        Some(blank) => SummarySections {
            key_points: lines[..blank].join("\n").trim().to_string(),
            details: lines[blank + 1..].join("\n").trim().to_string(),
        },
        None => SummarySections {
            key_points: String::new(),
            details: normalized.trim().to_string(),
        },
    }
}

/// HTTP status reported for each failure kind
pub fn status_for_error(err: &AppError) -> StatusCode {
    match err {
        AppError::Validation(_) => StatusCode::BAD_REQUEST,
        AppError::Resolution(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AppError::Cancelled | AppError::JobAlreadyRunning(_) => StatusCode::CONFLICT,
        AppError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
        AppError::Fetch(_)
        | AppError::Upload(_)
        | AppError::RemoteProcessing { .. }
        | AppError::Generation(_)
        | AppError::Network(_) => StatusCode::BAD_GATEWAY,
        AppError::Configuration(_) | AppError::Runtime(_) | AppError::Io(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Run the pipeline for one URL and return notices plus the summary
pub async fn summarize(
    State(state): State<AppState>,
    Json(request): Json<SummarizeRequest>,
) -> (StatusCode, Json<SummarizeResponse>) {
    let url = request.url.trim();
    if url.is_empty() {
        warn!("⚠️ Rejected summarize request with empty URL");
        return (
            StatusCode::BAD_REQUEST,
            Json(SummarizeResponse::rejected("Please enter a video URL")),
        );
    }

    let video_request = match request.job_id.as_deref() {
        Some(id) => match uuid::Uuid::parse_str(id) {
            Ok(id) => VideoRequest::with_id(id.to_string(), url),
            Err(_) => {
                return (
                    StatusCode::BAD_REQUEST,
                    Json(SummarizeResponse::rejected("job_id must be a UUID")),
                )
            }
        },
        None => VideoRequest::new(url),
    };
    let job_id = video_request.id.clone();

    info!("📺 Summarizing {} as job {}", url, job_id);
    let log = NoticeLog::new();

    match state
        .runtime
        .submit(video_request, Some(log.callback()))
        .await
    {
        Ok(result) => {
            info!("✅ Job {} finished: {}", job_id, result.title);
            let sections = split_summary(&result.text);
            (
                StatusCode::OK,
                Json(SummarizeResponse {
                    job_id: Some(job_id),
                    title: Some(result.title),
                    summary: Some(result.text),
                    sections: Some(sections),
                    notices: log.snapshot(),
                    error: None,
                }),
            )
        }
        Err(e) => {
            error!("❌ Job {} failed: {}", job_id, e);
            let message = format!("Failed to summarize video: {}", e);
            let mut notices = log.snapshot();
            if !notices.iter().any(|n| n.level == NoticeLevel::Error) {
                notices.push(Notice::new(
                    NoticeLevel::Error,
                    PipelineStage::Failed,
                    message.clone(),
                ));
            }
            (
                status_for_error(&e),
                Json(SummarizeResponse {
                    job_id: Some(job_id),
                    title: None,
                    summary: None,
                    sections: None,
                    notices,
                    error: Some(message),
                }),
            )
        }
    }
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> (StatusCode, Json<CancelResponse>) {
    info!("⏹️ Cancel requested for job {}", job_id);

    match state.runtime.cancel(job_id.clone()).await {
        Ok(true) => (
            StatusCode::ACCEPTED,
            Json(CancelResponse {
                job_id,
                cancelled: true,
            }),
        ),
        Ok(false) => (
            StatusCode::NOT_FOUND,
            Json(CancelResponse {
                job_id,
                cancelled: false,
            }),
        ),
        Err(e) => {
            error!("❌ Failed to cancel job {}: {}", job_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CancelResponse {
                    job_id,
                    cancelled: false,
                }),
            )
        }
    }
}

pub async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobSnapshot>> {
    Json(state.runtime.active_jobs())
}
