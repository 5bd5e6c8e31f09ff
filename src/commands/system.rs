//! System command handlers
//!
//! Health reporting and the bundled single-page UI.

use axum::extract::State;
use axum::response::Html;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::AppState;

const INDEX_HTML: &str = include_str!("index.html");

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub model: String,
    pub yt_dlp_available: bool,
    pub active_jobs: usize,
    pub timestamp: DateTime<Utc>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let yt_dlp_available = state.yt_dlp.check_available().await;
    debug!("🔍 Health check, yt-dlp available: {}", yt_dlp_available);

    Json(HealthResponse {
        status: if yt_dlp_available { "ok" } else { "degraded" }.to_string(),
        version: crate::VERSION.to_string(),
        model: state.config.gemini.model.clone(),
        yt_dlp_available,
        active_jobs: state.runtime.active_jobs().len(),
        timestamp: Utc::now(),
    })
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}
