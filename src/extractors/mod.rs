use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

pub mod video_id;
pub mod youtube;

pub use video_id::{parse_video_id, ParseError, VideoId};
pub use youtube::YtDlpExtractor;

/// Supported audio formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AudioFormat {
    Mp3,
    M4a,
    Wav,
    Flac,
    Ogg,
    Webm,
}

impl AudioFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "mp3",
            AudioFormat::M4a => "m4a",
            AudioFormat::Wav => "wav",
            AudioFormat::Flac => "flac",
            AudioFormat::Ogg => "ogg",
            AudioFormat::Webm => "webm",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "mp3" => Some(AudioFormat::Mp3),
            "m4a" | "aac" => Some(AudioFormat::M4a),
            "wav" => Some(AudioFormat::Wav),
            "flac" => Some(AudioFormat::Flac),
            "ogg" => Some(AudioFormat::Ogg),
            "webm" => Some(AudioFormat::Webm),
            _ => None,
        }
    }

    /// Get MIME type for the format
    pub fn mime_type(&self) -> &'static str {
        match self {
            AudioFormat::Mp3 => "audio/mpeg",
            AudioFormat::M4a => "audio/mp4",
            AudioFormat::Wav => "audio/wav",
            AudioFormat::Flac => "audio/flac",
            AudioFormat::Ogg => "audio/ogg",
            AudioFormat::Webm => "audio/webm",
        }
    }
}

/// Errors reported by an audio extraction provider
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("extraction failed: {0}")]
    Failed(String),

    #[error("video has no audio track: {0}")]
    NoAudioTrack(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Provider that turns a video URL into an audio file on disk
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Write the audio track of `url` to `output_path`
    async fn extract_audio(&self, url: &str, output_path: &Path) -> Result<(), ExtractError>;

    /// Format of the files this extractor produces
    fn output_format(&self) -> AudioFormat;

    /// Get the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Validate that a URL is absolute and uses HTTP or HTTPS
pub fn validate_url(url: &str) -> Option<Url> {
    let parsed = Url::parse(url.trim()).ok()?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }

    Some(parsed)
}
