use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::config::TranscriptionConfig;
use crate::{Result, ScribeError};

/// Wrapper around the WhisperX CLI, run inside a conda environment
///
/// The transcript files themselves are WhisperX's side effect; nothing here
/// parses them.
pub struct WhisperX {
    settings: TranscriptionConfig,
}

impl WhisperX {
    pub fn new(settings: &TranscriptionConfig) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    /// Transcript output directory for an audio file, one subdirectory per book
    pub fn transcript_dir_for(&self, audio: &Path) -> PathBuf {
        let stem = audio
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "transcript".to_string());
        self.settings.transcript_dir.join(stem)
    }

    /// Run WhisperX over an audio file, writing into `output_dir`
    ///
    /// The output directory is created first; WhisperX expects it to exist.
    pub async fn transcribe(&self, audio: &Path, output_dir: &Path) -> Result<()> {
        fs_err::create_dir_all(output_dir)?;

        let args = whisperx_args(&self.settings, audio, output_dir);
        tracing::info!(
            audio = %audio.display(),
            output = %output_dir.display(),
            model = %self.settings.model,
            "Running whisperx"
        );

        let output = Command::new(&self.settings.conda_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ScribeError::CommandFailed {
                program: self.settings.conda_path.clone(),
                status: "failed to spawn".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ScribeError::CommandFailed {
                program: format!("{} run whisperx", self.settings.conda_path),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }

        tracing::info!(output = %output_dir.display(), "Transcription completed");
        Ok(())
    }
}

/// conda argument list for a WhisperX run
pub fn whisperx_args(settings: &TranscriptionConfig, audio: &Path, output_dir: &Path) -> Vec<String> {
    vec![
        "run".to_string(),
        "-n".to_string(),
        settings.conda_env.clone(),
        "whisperx".to_string(),
        audio.to_string_lossy().into_owned(),
        "--model".to_string(),
        settings.model.clone(),
        "--align_model".to_string(),
        settings.align_model.clone(),
        "--batch_size".to_string(),
        settings.batch_size.to_string(),
        "--compute_type".to_string(),
        settings.compute_type.clone(),
        "--output_dir".to_string(),
        output_dir.to_string_lossy().into_owned(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[test]
    fn test_whisperx_args_layout() {
        let settings = Config::default().transcription;
        let args = whisperx_args(
            &settings,
            Path::new("public/audio/book.mp3"),
            Path::new("public/json/book"),
        );
        assert_eq!(
            args,
            vec![
                "run",
                "-n",
                "btt",
                "whisperx",
                "public/audio/book.mp3",
                "--model",
                "large-v2",
                "--align_model",
                "WAV2VEC2_ASR_LARGE_LV60K_960H",
                "--batch_size",
                "8",
                "--compute_type",
                "float32",
                "--output_dir",
                "public/json/book",
            ]
        );
    }

    #[test]
    fn test_transcript_dir_keyed_by_audio_stem() {
        let whisperx = WhisperX::new(&Config::default().transcription);
        assert_eq!(
            whisperx.transcript_dir_for(Path::new("public/audio/my-book.mp3")),
            PathBuf::from("public/json/my-book")
        );
    }

    #[tokio::test]
    async fn test_output_dir_exists_even_when_the_tool_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = Config::default().transcription;
        settings.conda_path = "bookscribe-test-missing-conda".to_string();
        settings.transcript_dir = dir.path().join("json");

        let whisperx = WhisperX::new(&settings);
        let audio = dir.path().join("book.mp3");
        let output_dir = whisperx.transcript_dir_for(&audio);

        let result = whisperx.transcribe(&audio, &output_dir).await;

        // The directory is created before the command is spawned
        assert!(result.is_err());
        assert!(output_dir.is_dir());
    }
}
