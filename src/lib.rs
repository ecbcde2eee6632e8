//! Video Translator - a Rust web service that turns a video URL into a translated transcript
//!
//! A request names a YouTube video and a target language. The service extracts the audio track,
//! transcribes it with a speech-to-text provider, translates the transcript and pushes progress
//! and results to every connected browser over a WebSocket.

pub mod audio;
pub mod cli;
pub mod config;
pub mod extractors;
pub mod hub;
pub mod output;
pub mod pipeline;
pub mod server;
pub mod telemetry;
pub mod transcribe;
pub mod translate;
pub mod utils;

pub use audio::{AudioArtifact, AudioFetcher, AudioSplitter, FetchError, FfmpegSplitter};
pub use cli::{Cli, Commands, OutputFormat};
pub use config::Config;
pub use extractors::{parse_video_id, AudioExtractor, AudioFormat, ParseError, VideoId};
pub use hub::{BroadcastEvent, BroadcastHub, Observer};
pub use pipeline::{JobHandle, JobId, JobOutcome, JobPipeline, JobRequest};
pub use transcribe::{SpeechToText, TranscriptionAdapter, TranscriptionError};
pub use translate::{TranslationAdapter, TranslationError, Translator};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error types specific to the translator
#[derive(thiserror::Error, Debug)]
pub enum TranslatorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Job {0} ended without a terminal event")]
    JobAborted(String),
}
