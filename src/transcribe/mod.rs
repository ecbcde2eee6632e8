use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::audio::{AudioArtifact, AudioSplitter};
use crate::extractors::AudioFormat;

pub mod whisper;

pub use whisper::WhisperClient;

/// Errors that abort a job during the transcribing stage
#[derive(Debug, thiserror::Error)]
pub enum TranscriptionError {
    #[error("could not read audio: {0}")]
    AudioUnavailable(String),

    #[error("api request failed: {0}")]
    ApiRequestFailed(String),

    #[error("transcription timed out after {0}s")]
    TimedOut(u64),
}

/// Speech-to-text provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Turn encoded audio into text
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        format: AudioFormat,
    ) -> Result<String, TranscriptionError>;

    /// Get the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Feeds audio artifacts to a speech-to-text provider.
///
/// Without a splitter this makes exactly one provider call per invocation. With one,
/// long audio is cut into segments that are transcribed in order and joined; a segment
/// that fails is skipped, and the call fails only when every segment does.
/// Retries of the whole artifact are the caller's decision.
pub struct TranscriptionAdapter {
    provider: Arc<dyn SpeechToText>,
    timeout: Duration,
    splitter: Option<Arc<dyn AudioSplitter>>,
    segment_secs: u64,
}

impl TranscriptionAdapter {
    pub fn new(provider: Arc<dyn SpeechToText>, timeout: Duration) -> Self {
        Self {
            provider,
            timeout,
            splitter: None,
            segment_secs: 0,
        }
    }

    /// Split audio into `segment_secs` pieces before transcribing; 0 keeps whole files
    pub fn with_splitter(mut self, splitter: Arc<dyn AudioSplitter>, segment_secs: u64) -> Self {
        self.splitter = (segment_secs > 0).then_some(splitter);
        self.segment_secs = segment_secs;
        self
    }

    pub async fn transcribe(&self, artifact: &AudioArtifact) -> Result<String, TranscriptionError> {
        if artifact.is_released() {
            return Err(TranscriptionError::AudioUnavailable("audio artifact already released".to_string()));
        }

        let segments = self.split(artifact).await;
        if segments.len() <= 1 {
            let audio = artifact
                .read_bytes()
                .await
                .map_err(|e| TranscriptionError::AudioUnavailable(e.to_string()))?;
            return self.call(&audio, &artifact.file_name(), artifact.format()).await;
        }

        let total = segments.len();
        let mut parts = Vec::with_capacity(total);
        let mut last_error = None;

        for (index, segment) in segments.iter().enumerate() {
            match self.transcribe_segment(segment, artifact.format()).await {
                Ok(text) => parts.push(text),
                Err(e) => {
                    tracing::warn!(segment = index, total, error = %e, "Skipping segment that failed to transcribe");
                    last_error = Some(e);
                }
            }
        }

        if parts.is_empty() {
            if let Some(e) = last_error {
                return Err(e);
            }
        }

        tracing::debug!(transcribed = parts.len(), total, "Joined segment transcripts");

        Ok(parts
            .into_iter()
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }

    /// Segment paths in playback order, or nothing when the artifact is sent whole
    async fn split(&self, artifact: &AudioArtifact) -> Vec<PathBuf> {
        let Some(splitter) = &self.splitter else {
            return Vec::new();
        };

        match splitter
            .split(artifact.path(), &artifact.segment_dir(), self.segment_secs)
            .await
        {
            Ok(segments) => segments,
            Err(e) => {
                tracing::warn!(error = %e, "Could not split audio, sending it whole");
                Vec::new()
            }
        }
    }

    async fn transcribe_segment(&self, segment: &Path, fallback: AudioFormat) -> Result<String, TranscriptionError> {
        let audio = read(segment).await?;
        let format = segment
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(AudioFormat::from_extension)
            .unwrap_or(fallback);
        let file_name = format!("audio.{}", format.as_str());

        self.call(&audio, &file_name, format).await
    }

    async fn call(&self, audio: &[u8], file_name: &str, format: AudioFormat) -> Result<String, TranscriptionError> {
        tracing::debug!(
            provider = self.provider.provider_name(),
            bytes = audio.len(),
            "Sending audio for transcription"
        );

        let call = self.provider.transcribe(audio, file_name, format);

        let text = tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| TranscriptionError::TimedOut(self.timeout.as_secs()))??;

        Ok(text.trim().to_string())
    }
}

async fn read(path: &Path) -> Result<Vec<u8>, TranscriptionError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| TranscriptionError::AudioUnavailable(e.to_string()))
}
