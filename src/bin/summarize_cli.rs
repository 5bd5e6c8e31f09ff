use std::env;

use video_summarizer::core::pipeline::{Notice, NoticeLevel, ProgressCallback};
use video_summarizer::core::summarizer::CancelFlag;
use video_summarizer::utils::logging::init_tracing_with_default;
use video_summarizer::{AppConfig, AppState, DefaultPipeline, SummaryResult, VideoRequest};

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: summarize_cli <video-url>");
        std::process::exit(1);
    }
    let url = args[1].trim().to_string();
    if url.is_empty() {
        eprintln!("Please enter a video URL");
        std::process::exit(1);
    }

    let dotenv = AppConfig::load_dotenv();
    init_tracing_with_default("video_summarizer=warn");
    if let Err(error) = dotenv {
        eprintln!("Warning: {error:#}");
    }

    let config = AppState::load_or_initialize_config();
    let pipeline = match DefaultPipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(error) => {
            eprintln!("Error: {error}");
            std::process::exit(1);
        }
    };

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Cancelling...");
                cancel.cancel();
            }
        });
    }

    let progress: ProgressCallback = std::sync::Arc::new(print_notice);
    match pipeline
        .execute(&VideoRequest::new(url), &cancel, Some(progress))
        .await
    {
        Ok(result) => print_result(result),
        Err(_) => std::process::exit(1),
    }
}

fn print_notice(notice: &Notice) {
    let marker = match notice.level {
        NoticeLevel::Info => "..",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "!!",
        NoticeLevel::Error => "xx",
    };
    eprintln!("[{}] {}", marker, notice.message);
}

fn print_result(result: SummaryResult) {
    println!("# {}", result.title);
    println!();
    println!("{}", result.text);
}
