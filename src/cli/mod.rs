use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "bookscribe",
    about = "Bookscribe - Download audiobooks from your Audible library and transcribe them with WhisperX",
    version,
    long_about = "A CLI tool that signs into your Audible library in a real browser session, \
captures the audiobook download, decrypts it to MP3 with ffmpeg and runs WhisperX to produce \
word-aligned transcripts."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in, download a book from the library, convert it and transcribe it
    Fetch {
        /// Title of the book as it appears in your library
        #[arg(value_name = "TITLE")]
        title: String,

        /// Account email for the storefront sign-in
        #[arg(long, env = "BOOKSCRIBE_EMAIL", value_name = "EMAIL")]
        email: String,

        /// Account password for the storefront sign-in
        #[arg(
            long,
            env = "BOOKSCRIBE_PASSWORD",
            value_name = "PASSWORD",
            hide_env_values = true
        )]
        password: String,

        /// Destination for the downloaded container file (default: <container_dir>/<title>.aax)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Activation bytes used by ffmpeg to decrypt the container (overrides config)
        #[arg(long, env = "BOOKSCRIBE_ACTIVATION_BYTES", hide_env_values = true)]
        activation_bytes: Option<String>,

        /// Stop after the audio conversion, skip WhisperX
        #[arg(long)]
        skip_transcription: bool,
    },

    /// Convert an already-downloaded container file and transcribe the result
    Convert {
        /// Path to the downloaded container file
        #[arg(value_name = "CONTAINER")]
        container: PathBuf,

        /// Activation bytes used by ffmpeg to decrypt the container (overrides config)
        #[arg(long, env = "BOOKSCRIBE_ACTIVATION_BYTES", hide_env_values = true)]
        activation_bytes: Option<String>,

        /// Stop after the audio conversion, skip WhisperX
        #[arg(long)]
        skip_transcription: bool,
    },

    /// Run WhisperX on an existing audio file
    Transcribe {
        /// Path to the audio file
        #[arg(value_name = "AUDIO")]
        audio: PathBuf,

        /// Transcript output directory (default: <transcript_dir>/<audio stem>)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Download any URL straight to disk
    Download {
        /// URL to fetch
        #[arg(value_name = "URL")]
        url: String,

        /// Destination file (default: last URL path segment)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Inspect or bootstrap the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}
