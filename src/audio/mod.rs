//! Temporary audio artifacts and the fetcher that produces them.
//!
//! Every fetch gets its own uniquely named directory under the configured temp root. The
//! [`AudioArtifact`] owns that directory: [`AudioArtifact::release`] removes it, and dropping an
//! artifact that was never released removes it as well, so partial downloads never outlive
//! the job that created them.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use uuid::Uuid;

use crate::extractors::{AudioExtractor, AudioFormat, ExtractError};
use crate::utils::format_file_size;

pub mod segment;

pub use segment::{AudioSplitter, FfmpegSplitter, SplitError};
#[cfg(test)]
pub use segment::MockAudioSplitter;

/// Errors that abort a job during the fetching stage
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("audio fetch failed: {0}")]
    FetchFailed(String),

    #[error("no audio track: {0}")]
    NoAudioTrack(String),
}

/// Ownership token for one job's temporary audio data
#[derive(Debug)]
pub struct AudioArtifact {
    dir: Option<TempDir>,
    dir_path: PathBuf,
    path: PathBuf,
    format: AudioFormat,
}

impl AudioArtifact {
    fn new(dir: TempDir, file_name: &str, format: AudioFormat) -> Self {
        let dir_path = dir.path().to_path_buf();
        let path = dir_path.join(file_name);

        Self {
            dir: Some(dir),
            dir_path,
            path,
            format,
        }
    }

    /// Path of the audio file inside the artifact directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory owned by this artifact
    pub fn dir_path(&self) -> &Path {
        &self.dir_path
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    /// File name reported to the transcription provider
    pub fn file_name(&self) -> String {
        format!("audio.{}", self.format.as_str())
    }

    pub fn is_released(&self) -> bool {
        self.dir.is_none()
    }

    /// Read the whole audio file into memory
    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        if self.is_released() {
            return Err(io::Error::new(io::ErrorKind::NotFound, "audio artifact already released"));
        }

        tokio::fs::read(&self.path).await
    }

    /// Directory that split segments of this artifact are written to
    pub fn segment_dir(&self) -> PathBuf {
        self.dir_path.join("segments")
    }

    /// Delete the artifact directory, segments included, on the blocking pool.
    /// Returns `true` only for the call that removed it.
    pub async fn release(&mut self) -> bool {
        let Some(dir) = self.dir.take() else {
            return false;
        };

        let removed = tokio::task::spawn_blocking(move || dir.close())
            .await
            .unwrap_or_else(|e| Err(io::Error::new(io::ErrorKind::Other, e)));
        self.log_removal(removed);

        true
    }

    fn release_blocking(&mut self) {
        if let Some(dir) = self.dir.take() {
            self.log_removal(dir.close());
        }
    }

    fn log_removal(&self, removed: io::Result<()>) {
        match removed {
            Ok(()) => tracing::debug!(path = %self.dir_path.display(), "Released audio artifact"),
            Err(e) => tracing::warn!(
                error = %e,
                path = %self.dir_path.display(),
                "Failed to remove audio artifact directory"
            ),
        }
    }

    /// Point the artifact at the file the provider actually wrote
    async fn locate_output(&mut self) -> io::Result<Option<u64>> {
        if let Ok(meta) = tokio::fs::metadata(&self.path).await {
            return Ok(Some(meta.len()));
        }

        // Providers may keep the source container when conversion is skipped
        let mut entries = tokio::fs::read_dir(&self.dir_path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let format = path
                .extension()
                .and_then(|ext| AudioFormat::from_extension(&ext.to_string_lossy()));

            if let Some(format) = format {
                let len = entry.metadata().await?.len();
                self.path = path;
                self.format = format;
                return Ok(Some(len));
            }
        }

        Ok(None)
    }
}

impl Drop for AudioArtifact {
    fn drop(&mut self) {
        if self.dir.is_some() {
            tracing::warn!(path = %self.dir_path.display(), "Audio artifact dropped without release");
            self.release_blocking();
        }
    }
}

/// Wraps an extraction provider and hands out scoped audio artifacts
pub struct AudioFetcher {
    extractor: Arc<dyn AudioExtractor>,
    temp_root: PathBuf,
    timeout: Duration,
}

impl AudioFetcher {
    pub fn new(extractor: Arc<dyn AudioExtractor>, temp_root: PathBuf, timeout: Duration) -> Self {
        Self {
            extractor,
            temp_root,
            timeout,
        }
    }

    /// Download the audio track of `url` into a fresh artifact
    pub async fn fetch(&self, url: &str) -> Result<AudioArtifact, FetchError> {
        tokio::fs::create_dir_all(&self.temp_root)
            .await
            .map_err(|e| FetchError::FetchFailed(format!("temp root {}: {}", self.temp_root.display(), e)))?;

        let dir = tempfile::Builder::new()
            .prefix(&format!("audio_{}", Uuid::new_v4().simple()))
            .rand_bytes(0)
            .tempdir_in(&self.temp_root)
            .map_err(|e| FetchError::FetchFailed(format!("could not create artifact directory: {}", e)))?;

        let format = self.extractor.output_format();
        let mut artifact = AudioArtifact::new(dir, &format!("audio.{}", format.as_str()), format);

        tracing::info!(
            provider = self.extractor.provider_name(),
            path = %artifact.dir_path().display(),
            "Fetching audio"
        );

        let extracted = tokio::time::timeout(self.timeout, self.extractor.extract_audio(url, artifact.path())).await;

        let failure = match extracted {
            Ok(Ok(())) => None,
            Ok(Err(ExtractError::NoAudioTrack(reason))) => Some(FetchError::NoAudioTrack(reason)),
            Ok(Err(e)) => Some(FetchError::FetchFailed(e.to_string())),
            Err(_) => Some(FetchError::FetchFailed(format!(
                "timed out after {}s",
                self.timeout.as_secs()
            ))),
        };

        if let Some(err) = failure {
            artifact.release().await;
            return Err(err);
        }

        match artifact.locate_output().await {
            Ok(Some(len)) if len > 0 => {
                tracing::info!(size = %format_file_size(len), format = artifact.format().as_str(), "Audio fetched");
                Ok(artifact)
            }
            Ok(_) => {
                artifact.release().await;
                Err(FetchError::NoAudioTrack("provider produced no audio data".to_string()))
            }
            Err(e) => {
                artifact.release().await;
                Err(FetchError::FetchFailed(format!("could not inspect artifact: {}", e)))
            }
        }
    }
}
