use serde::Serialize;
use std::fmt;
use url::Url;

use super::validate_url;

/// Length of a YouTube video identifier
pub const VIDEO_ID_LEN: usize = 11;

/// Canonical YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct VideoId(String);

impl VideoId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Canonical watch URL for this video, without playlist or tracking parameters
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }

    fn from_segment(segment: &str) -> Option<Self> {
        let valid = segment.len() == VIDEO_ID_LEN
            && segment
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

        valid.then(|| Self(segment.to_string()))
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reasons a submitted URL cannot start a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid url")]
    InvalidUrl,

    #[error("invalid video url")]
    UnrecognizedVideoUrl,
}

/// Extract the video identifier from a YouTube URL
///
/// Accepts `youtube.com/watch?v=<id>`, `youtube.com/embed/<id>` (plus the `shorts`, `live`
/// and `v` path forms) and `youtu.be/<id>`. The identifier must be exactly eleven characters
/// from `[A-Za-z0-9_-]`.
pub fn parse_video_id(url: &str) -> Result<VideoId, ParseError> {
    let parsed = validate_url(url).ok_or(ParseError::InvalidUrl)?;

    extract_from(&parsed).ok_or(ParseError::UnrecognizedVideoUrl)
}

fn extract_from(url: &Url) -> Option<VideoId> {
    let host = url.host_str()?.to_lowercase();
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .or_else(|| host.strip_prefix("music."))
        .unwrap_or(&host);

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    match host {
        "youtu.be" => segments.next().and_then(VideoId::from_segment),
        "youtube.com" | "youtube-nocookie.com" => match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .and_then(|(_, value)| VideoId::from_segment(&value)),
            "embed" | "shorts" | "live" | "v" => segments.next().and_then(VideoId::from_segment),
            _ => None,
        },
        _ => None,
    }
}
