//! Core business logic module
//!
//! This module contains the domain models, the video and AI service
//! boundaries, and the pipeline that ties them together.

pub mod config;
pub mod gemini_client;
pub mod models;
pub mod pipeline;
pub mod runtime;
pub mod summarizer;
pub mod video_fetcher;

#[cfg(test)]
mod config_test;


// Re-export commonly used types
pub use config::AppConfig;
pub use pipeline::Pipeline;
