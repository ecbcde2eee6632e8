use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

const SEGMENT_PREFIX: &str = "segment_";

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("could not run {0}: {1}")]
    Spawn(String, std::io::Error),

    #[error("splitting failed: {0}")]
    Failed(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Cuts long audio into fixed-length pieces the speech-to-text provider accepts
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AudioSplitter: Send + Sync {
    /// Write segments of at most `segment_secs` seconds into `output_dir`, returned in playback order
    async fn split(&self, input: &Path, output_dir: &Path, segment_secs: u64) -> Result<Vec<PathBuf>, SplitError>;
}

/// Splits with ffmpeg's segment muxer, copying the stream without re-encoding
pub struct FfmpegSplitter {
    ffmpeg_path: String,
}

impl FfmpegSplitter {
    pub fn new(ffmpeg_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
        }
    }
}

impl Default for FfmpegSplitter {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

#[async_trait]
impl AudioSplitter for FfmpegSplitter {
    async fn split(&self, input: &Path, output_dir: &Path, segment_secs: u64) -> Result<Vec<PathBuf>, SplitError> {
        tokio::fs::create_dir_all(output_dir).await?;

        let extension = input.extension().and_then(|ext| ext.to_str()).unwrap_or("mp3");
        let pattern = output_dir.join(format!("{}%03d.{}", SEGMENT_PREFIX, extension));

        tracing::debug!(input = %input.display(), segment_secs, "Splitting audio with ffmpeg");

        let output = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y", "-i"])
            .arg(input)
            .args(["-f", "segment", "-segment_time"])
            .arg(segment_secs.to_string())
            .args(["-c", "copy", "-reset_timestamps", "1"])
            .arg(&pattern)
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SplitError::Spawn(self.ffmpeg_path.clone(), e))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(SplitError::Failed(error));
        }

        list_segments(output_dir).await
    }
}

/// Segment files in `dir`, in playback order
pub async fn list_segments(dir: &Path) -> Result<Vec<PathBuf>, SplitError> {
    let mut segments = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_segment = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(SEGMENT_PREFIX));

        if is_segment {
            segments.push(path);
        }
    }

    // Names are zero-padded, so lexical order is playback order
    segments.sort();
    Ok(segments)
}
