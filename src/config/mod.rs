use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::utils::sanitize_filename;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Browser session settings
    pub storefront: StorefrontConfig,

    /// ffmpeg conversion settings
    pub conversion: ConversionConfig,

    /// WhisperX settings
    pub transcription: TranscriptionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorefrontConfig {
    /// Sign-in page URL
    pub signin_url: String,

    /// Library listing URL
    pub library_url: String,

    /// Run the browser without a visible window
    pub headless: bool,

    /// Browser viewport width in pixels
    pub viewport_width: u32,

    /// Browser viewport height in pixels
    pub viewport_height: u32,

    /// Delay between simulated keystrokes in milliseconds
    pub type_delay_ms: u64,

    /// Settle time after submit clicks in seconds
    pub post_click_wait_secs: u64,

    /// How long to wait for the library download request to show up, in seconds
    pub download_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    /// ffmpeg binary to invoke
    pub ffmpeg_path: String,

    /// Activation bytes for decrypting the container (can also be passed on the CLI)
    pub activation_bytes: Option<String>,

    /// Directory for downloaded container files
    pub container_dir: PathBuf,

    /// Directory for converted audio files
    pub audio_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// conda binary to invoke
    pub conda_path: String,

    /// conda environment that has whisperx installed
    pub conda_env: String,

    /// Whisper model name
    pub model: String,

    /// Alignment model name
    pub align_model: String,

    /// Batch size passed to whisperx
    pub batch_size: u32,

    /// Compute type passed to whisperx
    pub compute_type: String,

    /// Root directory for transcript output, one subdirectory per book
    pub transcript_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storefront: StorefrontConfig {
                signin_url: "https://www.audible.com/sign-in".to_string(),
                library_url: "https://www.audible.com/library/titles".to_string(),
                headless: false,
                viewport_width: 1280,
                viewport_height: 800,
                type_delay_ms: 100,
                post_click_wait_secs: 3,
                download_timeout_secs: 300,
            },
            conversion: ConversionConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                activation_bytes: None,
                container_dir: PathBuf::from("downloads"),
                audio_dir: PathBuf::from("public/audio"),
            },
            transcription: TranscriptionConfig {
                conda_path: "conda".to_string(),
                conda_env: "btt".to_string(),
                model: "large-v2".to_string(),
                align_model: "WAV2VEC2_ASR_LARGE_LV60K_960H".to_string(),
                batch_size: 8,
                compute_type: "float32".to_string(),
                transcript_dir: PathBuf::from("public/json"),
            },
        }
    }
}

impl Config {
    /// Load configuration from file or create default
    pub async fn load() -> Result<Self> {
        let config_path = Self::location()?;

        if config_path.exists() {
            let content =
                fs_err::read_to_string(&config_path).context("Failed to read config file")?;

            let config: Config =
                serde_yaml::from_str(&content).context("Failed to parse config file")?;

            config.validate()?;
            Ok(config)
        } else {
            let config = Self::default();
            config.save().await?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub async fn save(&self) -> Result<()> {
        let config_path = Self::location()?;

        if let Some(parent) = config_path.parent() {
            fs_err::create_dir_all(parent)?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize config")?;

        fs_err::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    /// Get configuration file path
    pub fn location() -> Result<PathBuf> {
        // First try current directory for easy testing
        let local_config = PathBuf::from("config.yaml");
        if local_config.exists() {
            return Ok(local_config);
        }

        let config_dir = dirs::config_dir().context("Could not determine config directory")?;

        Ok(config_dir.join("bookscribe").join("config.yaml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("storefront.signin_url", &self.storefront.signin_url),
            ("storefront.library_url", &self.storefront.library_url),
        ] {
            let parsed =
                Url::parse(value).with_context(|| format!("{} is not a valid URL", name))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("{} must use HTTP or HTTPS", name);
            }
        }

        if self.transcription.batch_size == 0 {
            anyhow::bail!("transcription.batch_size must be at least 1");
        }

        Ok(())
    }

    /// Default container destination for a book title
    pub fn container_path(&self, title: &str) -> PathBuf {
        self.conversion
            .container_dir
            .join(format!("{}.aax", sanitize_filename(title)))
    }

    /// Converted audio destination for a container file
    pub fn audio_path(&self, container: &Path) -> PathBuf {
        let stem = container
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audiobook".to_string());
        self.conversion.audio_dir.join(format!("{}.mp3", stem))
    }

    /// Display current configuration
    pub fn display(&self) {
        println!("Current Configuration:");
        println!("  Sign-in URL: {}", self.storefront.signin_url);
        println!("  Library URL: {}", self.storefront.library_url);
        println!("  Headless: {}", self.storefront.headless);
        println!("  ffmpeg: {}", self.conversion.ffmpeg_path);
        println!(
            "  Activation bytes: {}",
            if self.conversion.activation_bytes.is_some() {
                "configured"
            } else {
                "not set"
            }
        );
        println!("  Audio dir: {}", self.conversion.audio_dir.display());
        println!(
            "  Transcripts: {} (model {}, batch size {})",
            self.transcription.transcript_dir.display(),
            self.transcription.model,
            self.transcription.batch_size
        );
    }
}
