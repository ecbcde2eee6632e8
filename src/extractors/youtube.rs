use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use super::{AudioExtractor, AudioFormat, ExtractError};

/// Messages yt-dlp prints when a video has nothing to extract audio from
const NO_AUDIO_MARKERS: &[&str] = &[
    "requested format is not available",
    "does not have any audio",
    "no audio",
];

/// YouTube audio extractor using yt-dlp
pub struct YtDlpExtractor {
    yt_dlp_path: String,
}

impl YtDlpExtractor {
    pub fn new(yt_dlp_path: impl Into<String>) -> Self {
        Self {
            yt_dlp_path: yt_dlp_path.into(),
        }
    }

    /// yt-dlp picks the extension itself, so the output path becomes a template
    fn output_template(output_path: &Path) -> String {
        output_path
            .with_extension("%(ext)s")
            .to_string_lossy()
            .into_owned()
    }
}

#[async_trait]
impl AudioExtractor for YtDlpExtractor {
    async fn extract_audio(&self, url: &str, output_path: &Path) -> Result<(), ExtractError> {
        tracing::debug!(url = %url, output = %output_path.display(), "Downloading audio with yt-dlp");

        let template = Self::output_template(output_path);
        let output = Command::new(&self.yt_dlp_path)
            .args([
                "--output", &template,
                // Audio only, converted to mp3 for the transcription provider
                "--format", "bestaudio/best",
                "--extract-audio",
                "--audio-format", "mp3",
                "--audio-quality", "5",
                "--no-playlist",
                "--no-progress",
                "--quiet",
                url,
            ])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ExtractError::Failed(format!("could not run {}: {}", self.yt_dlp_path, e)))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let lowered = error.to_lowercase();

            if NO_AUDIO_MARKERS.iter().any(|marker| lowered.contains(marker)) {
                return Err(ExtractError::NoAudioTrack(error));
            }

            return Err(ExtractError::Failed(format!("yt-dlp exited with {}: {}", output.status, error)));
        }

        Ok(())
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    fn provider_name(&self) -> &'static str {
        "yt-dlp"
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new("yt-dlp")
    }
}
