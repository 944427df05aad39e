use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::convert::Transcoder;
use crate::download::{self, DownloadOutcome};
use crate::transcribe::WhisperX;
use crate::Result;

/// Outcome of one pipeline step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    Completed,
    Failed(String),
    Skipped,
}

impl StepStatus {
    pub fn is_completed(&self) -> bool {
        matches!(self, StepStatus::Completed)
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StepStatus::Completed => write!(f, "completed"),
            StepStatus::Failed(reason) => write!(f, "failed ({})", reason),
            StepStatus::Skipped => write!(f, "skipped"),
        }
    }
}

/// What happened during a single book run
///
/// Step failures land here instead of being thrown, so a failed conversion or
/// transcription still produces a report the caller can inspect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// The container file on disk
    pub container: PathBuf,

    /// Converted audio file, present only if conversion completed
    pub audio: Option<PathBuf>,

    /// Transcript output directory, present only if transcription was attempted
    pub transcript_dir: Option<PathBuf>,

    /// Conversion step outcome
    pub conversion: StepStatus,

    /// Transcription step outcome
    pub transcription: StepStatus,

    /// Timestamp when the run finished
    pub completed_at: DateTime<Utc>,
}

impl RunReport {
    /// Print a short human-readable summary
    pub fn print_summary(&self) {
        println!("Run finished:");
        println!("  Container: {}", self.container.display());
        println!("  Conversion: {}", self.conversion);
        if let Some(audio) = &self.audio {
            println!("  Audio: {}", audio.display());
        }
        println!("  Transcription: {}", self.transcription);
        if let Some(dir) = &self.transcript_dir {
            println!("  Transcripts: {}", dir.display());
        }
    }
}

/// Options carried through a pipeline run
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Overrides the configured activation bytes
    pub activation_bytes: Option<String>,

    /// Stop after conversion
    pub skip_transcription: bool,

    /// Suppress progress bars
    pub quiet: bool,
}

/// Linear acquisition pipeline: storefront download, ffmpeg conversion, WhisperX
pub struct BookPipeline {
    config: Config,
    options: PipelineOptions,
    client: reqwest::Client,
}

impl BookPipeline {
    pub fn new(config: Config, options: PipelineOptions) -> Self {
        Self {
            config,
            options,
            client: reqwest::Client::new(),
        }
    }

    fn activation_bytes(&self) -> Result<String> {
        self.options
            .activation_bytes
            .clone()
            .or_else(|| self.config.conversion.activation_bytes.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "No activation bytes available; set conversion.activation_bytes in the \
                     config or pass --activation-bytes"
                )
            })
    }

    /// Full flow: sign in, capture the download, convert, transcribe
    pub async fn run(
        &self,
        email: &str,
        password: &str,
        title: &str,
        destination: Option<PathBuf>,
    ) -> Result<RunReport> {
        let destination = destination.unwrap_or_else(|| self.config.container_path(title));

        let outcome = download::acquire_container(
            &self.config,
            &self.client,
            email,
            password,
            title,
            &destination,
            self.options.quiet,
        )
        .await?;

        if let DownloadOutcome::Downloaded(path) = &outcome {
            tracing::info!(path = %path.display(), "Container downloaded");
        }

        self.process_container(outcome.path()).await
    }

    /// Convert a container and, unless disabled, transcribe the result
    ///
    /// A failed conversion is recorded and skips transcription; the run still
    /// returns a report rather than an error.
    pub async fn process_container(&self, container: &Path) -> Result<RunReport> {
        let audio = self.config.audio_path(container);
        let transcoder = Transcoder::new(&self.config.conversion, self.activation_bytes()?);

        let conversion = match transcoder.convert(container, &audio).await {
            Ok(()) => StepStatus::Completed,
            Err(e) => {
                tracing::error!("Conversion failed: {e:#}");
                StepStatus::Failed(format!("{e:#}"))
            }
        };

        let mut transcript_dir = None;
        let transcription = if !conversion.is_completed() {
            StepStatus::Skipped
        } else if self.options.skip_transcription {
            tracing::info!("Transcription disabled, stopping after conversion");
            StepStatus::Skipped
        } else {
            let whisperx = WhisperX::new(&self.config.transcription);
            let dir = whisperx.transcript_dir_for(&audio);
            transcript_dir = Some(dir.clone());
            match whisperx.transcribe(&audio, &dir).await {
                Ok(()) => StepStatus::Completed,
                Err(e) => {
                    tracing::error!("Transcription failed: {e:#}");
                    StepStatus::Failed(format!("{e:#}"))
                }
            }
        };

        Ok(RunReport {
            container: container.to_path_buf(),
            audio: conversion.is_completed().then(|| audio.clone()),
            transcript_dir,
            conversion,
            transcription,
            completed_at: Utc::now(),
        })
    }

    /// Run only the transcription step on an existing audio file
    pub async fn transcribe_only(
        &self,
        audio: &Path,
        output_dir: Option<PathBuf>,
    ) -> Result<PathBuf> {
        crate::utils::check_file_accessible(audio)?;

        let whisperx = WhisperX::new(&self.config.transcription);
        let dir = output_dir.unwrap_or_else(|| whisperx.transcript_dir_for(audio));
        whisperx.transcribe(audio, &dir).await?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Config pointing every filesystem path at a scratch directory
    fn test_config(root: &Path) -> Config {
        let mut config = Config::default();
        config.conversion.container_dir = root.join("downloads");
        config.conversion.audio_dir = root.join("audio");
        config.conversion.activation_bytes = Some("1a2b3c4d".to_string());
        config.transcription.transcript_dir = root.join("json");
        config
    }

    fn test_options() -> PipelineOptions {
        PipelineOptions {
            quiet: true,
            ..PipelineOptions::default()
        }
    }

    #[tokio::test]
    async fn test_failed_conversion_is_reported_and_skips_transcription() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("book.aax");
        fs_err::write(&container, b"bytes").unwrap();

        let mut config = test_config(dir.path());
        config.conversion.ffmpeg_path = "bookscribe-test-missing-ffmpeg".to_string();

        let pipeline = BookPipeline::new(config, test_options());
        let report = pipeline.process_container(&container).await.unwrap();

        assert!(matches!(report.conversion, StepStatus::Failed(_)));
        assert_eq!(report.transcription, StepStatus::Skipped);
        assert_eq!(report.audio, None);
        assert_eq!(report.transcript_dir, None);
    }

    #[tokio::test]
    async fn test_successful_conversion_with_transcription_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("book.aax");
        fs_err::write(&container, b"bytes").unwrap();

        let mut config = test_config(dir.path());
        // `true` exits zero regardless of arguments, standing in for ffmpeg
        config.conversion.ffmpeg_path = "true".to_string();

        let options = PipelineOptions {
            skip_transcription: true,
            ..test_options()
        };
        let pipeline = BookPipeline::new(config, options);
        let report = pipeline.process_container(&container).await.unwrap();

        assert_eq!(report.conversion, StepStatus::Completed);
        assert_eq!(report.transcription, StepStatus::Skipped);
        assert_eq!(report.audio, Some(dir.path().join("audio/book.mp3")));
    }

    #[tokio::test]
    async fn test_transcription_failure_is_recorded_not_thrown() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("book.aax");
        fs_err::write(&container, b"bytes").unwrap();

        let mut config = test_config(dir.path());
        config.conversion.ffmpeg_path = "true".to_string();
        config.transcription.conda_path = "bookscribe-test-missing-conda".to_string();

        let pipeline = BookPipeline::new(config, test_options());
        let report = pipeline.process_container(&container).await.unwrap();

        assert_eq!(report.conversion, StepStatus::Completed);
        assert!(matches!(report.transcription, StepStatus::Failed(_)));
        // The output directory was still prepared before the attempt
        assert_eq!(report.transcript_dir, Some(dir.path().join("json/book")));
        assert!(dir.path().join("json/book").is_dir());
    }

    #[tokio::test]
    async fn test_missing_activation_bytes_is_an_explicit_error() {
        let dir = tempfile::tempdir().unwrap();
        let container = dir.path().join("book.aax");
        fs_err::write(&container, b"bytes").unwrap();

        let mut config = test_config(dir.path());
        config.conversion.activation_bytes = None;

        let pipeline = BookPipeline::new(config, test_options());
        let result = pipeline.process_container(&container).await;

        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("activation bytes"));
    }
}
