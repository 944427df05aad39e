//! Bookscribe - a CLI tool for turning an Audible library entry into a transcript
//!
//! This library drives a browser session to download an audiobook container from
//! the user's library, converts it to MP3 with ffmpeg and feeds the result to
//! WhisperX for speech-to-text.

pub mod cli;
pub mod config;
pub mod convert;
pub mod download;
pub mod pipeline;
pub mod storefront;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use download::DownloadOutcome;
pub use pipeline::{BookPipeline, RunReport, StepStatus};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to bookscribe
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("Browser automation failed: {0}")]
    Browser(String),

    #[error("Selector not found: {0}")]
    SelectorNotFound(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("{program} failed with {status}: {stderr}")]
    CommandFailed {
        program: String,
        status: String,
        stderr: String,
    },

    #[error("File operation failed: {0}")]
    FileError(String),
}
