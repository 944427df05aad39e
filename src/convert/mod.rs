use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::config::ConversionConfig;
use crate::{Result, ScribeError};

/// Wrapper around the external ffmpeg binary
///
/// ffmpeg owns the container format entirely; this struct only builds the
/// command line and reports failures with their captured stderr.
pub struct Transcoder {
    ffmpeg_path: String,
    activation_bytes: String,
}

impl Transcoder {
    pub fn new(settings: &ConversionConfig, activation_bytes: String) -> Self {
        Self {
            ffmpeg_path: settings.ffmpeg_path.clone(),
            activation_bytes,
        }
    }

    /// Decrypt and convert a container file into a playable audio file
    pub async fn convert(&self, container: &Path, audio_out: &Path) -> Result<()> {
        if let Some(parent) = audio_out.parent() {
            if !parent.as_os_str().is_empty() {
                fs_err::create_dir_all(parent)?;
            }
        }

        let args = ffmpeg_args(&self.activation_bytes, container, audio_out);
        tracing::info!(
            input = %container.display(),
            output = %audio_out.display(),
            "Running ffmpeg"
        );

        let output = Command::new(&self.ffmpeg_path)
            .args(&args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ScribeError::CommandFailed {
                program: self.ffmpeg_path.clone(),
                status: "failed to spawn".to_string(),
                stderr: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ScribeError::CommandFailed {
                program: self.ffmpeg_path.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            }
            .into());
        }

        tracing::info!(output = %audio_out.display(), "Conversion completed");
        Ok(())
    }
}

/// ffmpeg argument list for decrypting a container into an audio file
pub fn ffmpeg_args(activation_bytes: &str, container: &Path, audio_out: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-activation_bytes".to_string(),
        activation_bytes.to_string(),
        "-i".to_string(),
        container.to_string_lossy().into_owned(),
        audio_out.to_string_lossy().into_owned(),
    ]
}
