//! HTTP command handlers
//!
//! The presentation surface: a single-page form plus JSON endpoints that hand
//! requests to the summary runtime.

pub mod summarize;
pub mod system;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub use summarize::{split_summary, SummarySections};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(system::index))
        .route("/api/health", get(system::health))
        .route("/api/summarize", post(summarize::summarize))
        .route("/api/jobs", get(summarize::list_jobs))
        .route("/api/jobs/:id/cancel", post(summarize::cancel_job))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
