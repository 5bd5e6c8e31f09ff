use anyhow::{Context, Result};
use tracing::{error, info, warn};

use video_summarizer::commands;
use video_summarizer::utils::file_utils::ensure_dir_exists;
use video_summarizer::utils::logging::init_tracing;
use video_summarizer::{AppConfig, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    let dotenv = AppConfig::load_dotenv();
    init_tracing();
    info!(
        "🚀 Starting {} v{}",
        video_summarizer::NAME,
        video_summarizer::VERSION
    );
    match dotenv {
        Ok(Some(path)) => info!("Loaded environment from {}", path.display()),
        Ok(None) => {}
        Err(e) => warn!("{:#}", e),
    }

    let config = AppState::load_or_initialize_config();

    let temp_dir = config.fetcher.temp_dir();
    ensure_dir_exists(&temp_dir)?;
    info!("📁 Temporary videos go to {}", temp_dir.display());

    let bind_address = config.server.bind_address.clone();
    let state = match AppState::from_config(config) {
        Ok(state) => state,
        Err(e) => {
            error!("❌ {}", e);
            anyhow::bail!("{}. Set GOOGLE_API_KEY before starting the server", e);
        }
    };

    if !state.yt_dlp.check_available().await {
        warn!(
            "⚠️ yt-dlp was not found at '{}'; downloads will fail until it is installed",
            state.yt_dlp.binary()
        );
    }

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;
    info!("✅ Listening on http://{}", bind_address);

    axum::serve(listener, commands::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("👋 Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
    }
}
