use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::audio::AudioArtifact;
use crate::extractors::{parse_video_id, ParseError, VideoId};
use crate::utils::normalize_language_code;

/// Identifier attached to every event a job emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What a caller asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub url: String,
    pub target_language: Option<String>,
}

impl JobRequest {
    pub fn new(url: impl Into<String>, target_language: Option<String>) -> Self {
        Self {
            url: url.into(),
            target_language,
        }
    }
}

/// Stages that can end a job with a failure. Translation degrades instead of failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStage {
    Parsing,
    Fetching,
    Transcribing,
}

impl FailedStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailedStage::Parsing => "PARSING",
            FailedStage::Fetching => "FETCHING",
            FailedStage::Transcribing => "TRANSCRIBING",
        }
    }
}

impl fmt::Display for FailedStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Parsing,
    Fetching,
    Transcribing,
    Translating,
    Done,
    Failed { stage: FailedStage, reason: String },
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Parsing => "PARSING",
            Stage::Fetching => "FETCHING",
            Stage::Transcribing => "TRANSCRIBING",
            Stage::Translating => "TRANSLATING",
            Stage::Done => "DONE",
            Stage::Failed { .. } => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Done | Stage::Failed { .. })
    }

    fn can_advance_to(&self, next: &Stage) -> bool {
        matches!(
            (self, next),
            (Stage::Parsing, Stage::Fetching)
                | (Stage::Fetching, Stage::Transcribing)
                | (Stage::Transcribing, Stage::Translating)
                | (Stage::Translating, Stage::Done)
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Failed { stage, reason } => write!(f, "FAILED({}: {})", stage, reason),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

/// One accepted request moving through the pipeline
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub requested_url: String,
    pub target_language: String,
    pub created_at: DateTime<Utc>,
    video_id: Option<VideoId>,
    stage: Stage,
    artifact: Option<AudioArtifact>,
    transcript: Option<String>,
}

impl Job {
    pub fn new(request: JobRequest, default_language: &str) -> Self {
        let target_language = request
            .target_language
            .as_deref()
            .map(str::trim)
            .filter(|lang| !lang.is_empty())
            .map(normalize_language_code)
            .unwrap_or_else(|| default_language.to_string());

        Self {
            id: JobId::new(),
            requested_url: request.url,
            target_language,
            created_at: Utc::now(),
            video_id: None,
            stage: Stage::Parsing,
            artifact: None,
            transcript: None,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn video_id(&self) -> Option<&VideoId> {
        self.video_id.as_ref()
    }

    pub fn artifact(&self) -> Option<&AudioArtifact> {
        self.artifact.as_ref()
    }

    /// Run the identifier parser. Success moves the job to `Fetching`.
    pub fn parse(&mut self) -> Result<VideoId, ParseError> {
        match parse_video_id(&self.requested_url) {
            Ok(video_id) => {
                self.video_id = Some(video_id.clone());
                self.advance(Stage::Fetching);
                Ok(video_id)
            }
            Err(e) => {
                self.fail(FailedStage::Parsing, e.to_string());
                Err(e)
            }
        }
    }

    /// Take ownership of the fetched audio and move to `Transcribing`
    pub fn attach_artifact(&mut self, artifact: AudioArtifact) {
        self.artifact = Some(artifact);
        self.advance(Stage::Transcribing);
    }

    /// Delete the audio artifact. Returns `true` only for the call that removed it.
    pub async fn release_artifact(&mut self) -> bool {
        match self.artifact.take() {
            Some(mut artifact) => artifact.release().await,
            None => false,
        }
    }

    pub fn set_transcript(&mut self, transcript: String) {
        self.transcript = Some(transcript);
        self.advance(Stage::Translating);
    }

    /// Finish after translating. Refuses to finish without a transcript.
    pub fn complete(&mut self) -> bool {
        if self.transcript.is_none() {
            tracing::error!(job_id = %self.id, "Refusing to complete a job without a transcript");
            return false;
        }

        self.advance(Stage::Done)
    }

    pub fn fail(&mut self, stage: FailedStage, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::debug!(job_id = %self.id, from = %self.stage, failed_at = %stage, "Job failed");
        // Callers release the artifact before failing; this only covers paths that did not
        drop(self.artifact.take());
        self.stage = Stage::Failed { stage, reason };
    }

    fn advance(&mut self, next: Stage) -> bool {
        if !self.stage.can_advance_to(&next) {
            tracing::error!(job_id = %self.id, from = %self.stage, to = %next, "Invalid job stage transition");
            return false;
        }

        tracing::debug!(job_id = %self.id, from = %self.stage, to = %next, "Job stage transition");
        self.stage = next;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(url: &str) -> Job {
        Job::new(JobRequest::new(url, None), "ar")
    }

    #[test]
    fn test_target_language_defaults() {
        assert_eq!(job("https://youtu.be/dQw4w9WgXcQ").target_language, "ar");

        let blank = Job::new(JobRequest::new("https://youtu.be/dQw4w9WgXcQ", Some("  ".into())), "ar");
        assert_eq!(blank.target_language, "ar");

        let named = Job::new(JobRequest::new("https://youtu.be/dQw4w9WgXcQ", Some("French".into())), "ar");
        assert_eq!(named.target_language, "fr");
    }

    #[test]
    fn test_parse_moves_to_fetching() {
        let mut job = job("https://www.youtube.com/watch?v=dQw4w9WgXcQ");

        assert_eq!(job.stage(), &Stage::Parsing);
        assert_eq!(job.parse().unwrap().as_str(), "dQw4w9WgXcQ");
        assert_eq!(job.stage(), &Stage::Fetching);
        assert_eq!(job.video_id().map(VideoId::as_str), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn test_parse_failure_is_terminal() {
        let mut job = job("not-a-url");

        assert_eq!(job.parse(), Err(ParseError::InvalidUrl));
        assert!(job.stage().is_terminal());
        assert!(matches!(job.stage(), Stage::Failed { stage: FailedStage::Parsing, .. }));
        assert!(job.video_id().is_none());
    }

    #[test]
    fn test_cannot_complete_without_transcript() {
        let mut job = job("https://youtu.be/dQw4w9WgXcQ");
        job.parse().unwrap();

        assert!(!job.complete());
        assert_ne!(job.stage(), &Stage::Done);
    }

    #[test]
    fn test_stages_only_move_forward() {
        assert!(Stage::Parsing.can_advance_to(&Stage::Fetching));
        assert!(Stage::Translating.can_advance_to(&Stage::Done));
        assert!(!Stage::Parsing.can_advance_to(&Stage::Done));
        assert!(!Stage::Done.can_advance_to(&Stage::Fetching));
    }

    #[tokio::test]
    async fn test_release_artifact_reports_once() {
        use crate::audio::AudioFetcher;
        use crate::extractors::{AudioFormat, MockAudioExtractor};
        use std::sync::Arc;
        use std::time::Duration;

        let root = tempfile::TempDir::new().unwrap();
        let mut extractor = MockAudioExtractor::new();
        extractor.expect_output_format().return_const(AudioFormat::Mp3);
        extractor.expect_provider_name().return_const("mock");
        extractor
            .expect_extract_audio()
            .returning(|_, path| Ok(std::fs::write(path, b"mp3 bytes")?));
        let artifact = AudioFetcher::new(Arc::new(extractor), root.path().to_path_buf(), Duration::from_secs(5))
            .fetch("https://youtu.be/dQw4w9WgXcQ")
            .await
            .unwrap();

        let mut job = job("https://youtu.be/dQw4w9WgXcQ");
        job.parse().unwrap();
        job.attach_artifact(artifact);

        assert!(job.release_artifact().await);
        assert!(!job.release_artifact().await);
        assert!(job.artifact().is_none());
        assert_eq!(std::fs::read_dir(root.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_job_ids_are_unique() {
        assert_ne!(JobId::new(), JobId::new());
    }
}
