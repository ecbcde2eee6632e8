use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "translator",
    about = "Video Translator - Transcribe and translate YouTube videos, live in the browser",
    version,
    long_about = "Extracts the audio track of a YouTube video with yt-dlp, transcribes it with OpenAI Whisper and translates the transcript with Google Translate. Run `serve` to push results to every connected browser over a WebSocket, or `translate` for a single job in the terminal."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (defaults to ./config.yaml, then the user config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the web service
    Serve {
        /// Interface to bind (overrides config)
        #[arg(long, value_name = "HOST")]
        host: Option<String>,

        /// Port to listen on (overrides config and PORT)
        #[arg(short, long, value_name = "PORT")]
        port: Option<u16>,
    },

    /// Translate a single video and print the result
    Translate {
        /// YouTube video URL
        #[arg(value_name = "URL")]
        url: String,

        /// Target language (e.g. ar, en, French)
        #[arg(short, long, value_name = "LANG")]
        lang: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,

        /// Output file path (prints to console if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Print the video id a URL resolves to
    Parse {
        #[arg(value_name = "URL")]
        url: String,
    },

    /// Write the default configuration or show the current one
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported URL forms
    Platforms,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// JSON, same shape as the WebSocket events
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
