//! Tracing subscriber setup shared by the server and CLI binaries

pub const DEFAULT_LOG_FILTER: &str = "video_summarizer=info,tower_http=info";

/// Install the global fmt subscriber; `RUST_LOG` overrides the default filter.
/// Calling it twice is harmless.
pub fn init_tracing() {
    init_tracing_with_default(DEFAULT_LOG_FILTER);
}

pub fn init_tracing_with_default(default_filter: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_filter.into());

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
