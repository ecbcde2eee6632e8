//! The job pipeline: parse, fetch, transcribe, translate, report.
//!
//! Every accepted request becomes a [`Job`] running in its own tokio task. Stages inside a job
//! run strictly in order; jobs run independently of each other and only share the
//! [`BroadcastHub`]. Each job broadcasts exactly one terminal event, including when a stage
//! panics, and its audio artifact is released before the task ends.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::FutureExt;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::audio::{AudioFetcher, FfmpegSplitter};
use crate::config::Config;
use crate::extractors::{ParseError, VideoId, YtDlpExtractor};
use crate::hub::{BroadcastEvent, BroadcastHub};
use crate::transcribe::{TranscriptionAdapter, TranscriptionError, WhisperClient};
use crate::translate::{GoogleTranslateClient, TranslationAdapter};
use crate::utils::format_duration;
use crate::TranslatorError;

pub mod job;

pub use job::{FailedStage, Job, JobId, JobRequest, Stage};

/// Message observers receive when a job fails. Observers are not told which stage failed.
pub const GENERIC_FAILURE: &str = "processing failed";

/// Final result of a job task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed {
        original_text: String,
        translated_text: String,
    },
    Failed {
        stage: FailedStage,
        reason: String,
    },
    /// A stage panicked
    Aborted { reason: String },
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// A started job
#[derive(Debug)]
pub struct JobHandle {
    pub job_id: JobId,
    pub video_id: VideoId,
    pub target_language: String,
    task: JoinHandle<JobOutcome>,
}

impl JobHandle {
    /// Wait for the job to settle
    pub async fn wait(self) -> crate::Result<JobOutcome> {
        self.task
            .await
            .map_err(|e| TranslatorError::JobAborted(format!("{}: {}", self.job_id, e)).into())
    }
}

/// Sequences the stage adapters for every job
pub struct JobPipeline {
    fetcher: AudioFetcher,
    transcriber: TranscriptionAdapter,
    translator: TranslationAdapter,
    hub: Arc<BroadcastHub>,
    default_language: String,
    transcription_attempts: u32,
    active_jobs: AtomicUsize,
}

impl JobPipeline {
    pub fn new(
        fetcher: AudioFetcher,
        transcriber: TranscriptionAdapter,
        translator: TranslationAdapter,
        hub: Arc<BroadcastHub>,
    ) -> Self {
        Self {
            fetcher,
            transcriber,
            translator,
            hub,
            default_language: "ar".to_string(),
            transcription_attempts: 1,
            active_jobs: AtomicUsize::new(0),
        }
    }

    /// Wire the yt-dlp, Whisper and Google Translate providers described by `config`
    pub fn from_config(config: &Config, hub: Arc<BroadcastHub>) -> Self {
        let providers = &config.providers;

        let extractor = YtDlpExtractor::new(providers.extractor.yt_dlp_path.clone());
        let speech_to_text = WhisperClient::new(
            providers.transcription.api_key.clone(),
            providers.transcription.base_url.clone(),
            providers.transcription.model.clone(),
        );
        let translator = GoogleTranslateClient::new(
            providers.translation.api_key.clone(),
            providers.translation.endpoint.clone(),
        );

        Self::new(
            AudioFetcher::new(Arc::new(extractor), config.temp_root(), config.fetch_timeout()),
            TranscriptionAdapter::new(Arc::new(speech_to_text), config.transcription_timeout())
                .with_splitter(Arc::new(FfmpegSplitter::default()), config.pipeline.segment_secs),
            TranslationAdapter::new(Arc::new(translator), config.translation_timeout()),
            hub,
        )
        .with_default_language(config.pipeline.default_target_language.clone())
        .with_transcription_attempts(config.pipeline.transcription_attempts)
    }

    /// Language used when a request does not name one
    pub fn with_default_language(mut self, language: impl Into<String>) -> Self {
        self.default_language = language.into();
        self
    }

    /// How many times the transcription provider is tried for one artifact
    pub fn with_transcription_attempts(mut self, attempts: u32) -> Self {
        self.transcription_attempts = attempts.max(1);
        self
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub fn active_jobs(&self) -> usize {
        self.active_jobs.load(Ordering::SeqCst)
    }

    /// Parse the request and, if it names a video, run the rest of the job in the background.
    ///
    /// Parse failures are returned to the caller; they never reach observers and never
    /// acquire an artifact.
    pub fn start(self: &Arc<Self>, request: JobRequest) -> Result<JobHandle, ParseError> {
        let mut job = Job::new(request, &self.default_language);

        let video_id = job.parse().map_err(|e| {
            tracing::info!(url = %job.requested_url, error = %e, "Rejected job request");
            e
        })?;

        let job_id = job.id;
        let target_language = job.target_language.clone();
        let span = tracing::info_span!("job", job_id = %job_id, video_id = %video_id);

        self.active_jobs.fetch_add(1, Ordering::SeqCst);
        let task = tokio::spawn(Arc::clone(self).run(job).instrument(span));

        Ok(JobHandle {
            job_id,
            video_id,
            target_language,
            task,
        })
    }

    async fn run(self: Arc<Self>, job: Job) -> JobOutcome {
        let job_id = job.id;
        let created_at = job.created_at;

        let outcome = match AssertUnwindSafe(self.execute(job)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::error!("Job panicked");
                self.hub.broadcast(BroadcastEvent::failed(job_id, GENERIC_FAILURE));
                JobOutcome::Aborted {
                    reason: "internal error".to_string(),
                }
            }
        };

        self.active_jobs.fetch_sub(1, Ordering::SeqCst);

        let elapsed = (chrono::Utc::now() - created_at).num_milliseconds().max(0) as f64 / 1000.0;
        tracing::info!(elapsed = %format_duration(elapsed), success = outcome.is_success(), "Job settled");

        outcome
    }

    async fn execute(&self, mut job: Job) -> JobOutcome {
        let Some(video_id) = job.video_id().cloned() else {
            return self.fail(&mut job, FailedStage::Parsing, "job started without a video id");
        };

        // Fetching
        self.hub.broadcast(BroadcastEvent::accepted(job.id, video_id.as_str()));

        let artifact = match self.fetcher.fetch(&video_id.watch_url()).await {
            Ok(artifact) => artifact,
            Err(e) => return self.fail(&mut job, FailedStage::Fetching, e.to_string()),
        };
        job.attach_artifact(artifact);

        // Transcribing; the artifact goes away whatever the provider said
        let transcription = self.transcribe(&job).await;
        job.release_artifact().await;

        let transcript = match transcription {
            Ok(text) => text,
            Err(e) => return self.fail(&mut job, FailedStage::Transcribing, e.to_string()),
        };
        job.set_transcript(transcript.clone());

        // Translating
        let translation = if transcript.is_empty() {
            tracing::info!("Empty transcript, skipping translation");
            String::new()
        } else {
            self.translator.translate(&transcript, &job.target_language).await
        };

        if !job.complete() {
            return self.fail(&mut job, FailedStage::Transcribing, "no transcript");
        }

        self.hub
            .broadcast(BroadcastEvent::completed(job.id, transcript.clone(), translation.clone()));

        tracing::info!(
            chars = transcript.len(),
            target = %job.target_language,
            "Job completed"
        );

        JobOutcome::Completed {
            original_text: transcript,
            translated_text: translation,
        }
    }

    async fn transcribe(&self, job: &Job) -> Result<String, TranscriptionError> {
        let artifact = job
            .artifact()
            .ok_or_else(|| TranscriptionError::AudioUnavailable("no artifact attached".to_string()))?;

        let mut attempt = 1;
        loop {
            match self.transcriber.transcribe(artifact).await {
                Ok(text) => return Ok(text),
                Err(e) if attempt < self.transcription_attempts => {
                    tracing::warn!(error = %e, attempt, "Transcription attempt failed, retrying");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn fail(&self, job: &mut Job, stage: FailedStage, reason: impl Into<String>) -> JobOutcome {
        let reason = reason.into();
        tracing::error!(stage = %stage, reason = %reason, "Job failed");

        job.fail(stage, reason.clone());
        self.hub.broadcast(BroadcastEvent::failed(job.id, GENERIC_FAILURE));

        JobOutcome::Failed { stage, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::{AudioFormat, ExtractError, MockAudioExtractor};
    use crate::transcribe::MockSpeechToText;
    use crate::translate::{MockTranslator, TranslationError};
    use crate::Observer;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    const URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

    struct Harness {
        pipeline: Arc<JobPipeline>,
        observer: Observer,
        root: TempDir,
        written: Arc<Mutex<Vec<PathBuf>>>,
    }

    fn extractor(fail: bool, written: Arc<Mutex<Vec<PathBuf>>>) -> MockAudioExtractor {
        let mut extractor = MockAudioExtractor::new();
        extractor.expect_output_format().return_const(AudioFormat::Mp3);
        extractor.expect_provider_name().return_const("mock");
        extractor.expect_extract_audio().returning(move |_, path| {
            written.lock().unwrap().push(path.to_path_buf());
            if fail {
                return Err(ExtractError::Failed("video unavailable".to_string()));
            }
            Ok(std::fs::write(path, b"audio")?)
        });
        extractor
    }

    fn harness(extract_fails: bool, stt: MockSpeechToText, translator: MockTranslator) -> Harness {
        let root = TempDir::new().unwrap();
        let written = Arc::new(Mutex::new(Vec::new()));
        let hub = Arc::new(BroadcastHub::default());
        let observer = hub.subscribe();

        let fetcher = AudioFetcher::new(
            Arc::new(extractor(extract_fails, Arc::clone(&written))),
            root.path().to_path_buf(),
            Duration::from_secs(5),
        );
        let pipeline = JobPipeline::new(
            fetcher,
            TranscriptionAdapter::new(Arc::new(stt), Duration::from_secs(5)),
            TranslationAdapter::new(Arc::new(translator), Duration::from_secs(5)),
            hub,
        );

        Harness {
            pipeline: Arc::new(pipeline),
            observer,
            root,
            written,
        }
    }

    fn stt_returning(result: fn() -> Result<String, TranscriptionError>, times: usize) -> MockSpeechToText {
        let mut stt = MockSpeechToText::new();
        stt.expect_provider_name().return_const("mock");
        stt.expect_transcribe().times(times).returning(move |_, _, _| result());
        stt
    }

    fn drain(observer: &mut Observer) -> Vec<BroadcastEvent> {
        std::iter::from_fn(|| observer.try_recv()).collect()
    }

    #[tokio::test]
    async fn test_successful_job_emits_accepted_then_completed() {
        let mut translator = MockTranslator::new();
        translator
            .expect_translate()
            .withf(|text, target| text == "hello" && target == "ar")
            .returning(|_, _| Ok("مرحبا".to_string()));
        let mut h = harness(false, stt_returning(|| Ok("hello".to_string()), 1), translator);

        let handle = h.pipeline.start(JobRequest::new(URL, None)).unwrap();
        let job_id = handle.job_id;
        let outcome = handle.wait().await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Completed {
                original_text: "hello".to_string(),
                translated_text: "مرحبا".to_string(),
            }
        );
        assert_eq!(
            drain(&mut h.observer),
            vec![
                BroadcastEvent::accepted(job_id, "dQw4w9WgXcQ"),
                BroadcastEvent::completed(job_id, "hello", "مرحبا"),
            ]
        );
        assert_eq!(h.pipeline.active_jobs(), 0);
    }

    #[tokio::test]
    async fn test_invalid_url_never_starts() {
        let mut h = harness(false, MockSpeechToText::new(), MockTranslator::new());

        let result = h.pipeline.start(JobRequest::new("not-a-url", None));

        assert_eq!(result.unwrap_err(), ParseError::InvalidUrl);
        assert!(drain(&mut h.observer).is_empty());
        assert!(h.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_emits_error() {
        let mut h = harness(true, MockSpeechToText::new(), MockTranslator::new());

        let handle = h.pipeline.start(JobRequest::new(URL, None)).unwrap();
        let job_id = handle.job_id;
        let outcome = handle.wait().await.unwrap();

        assert!(matches!(outcome, JobOutcome::Failed { stage: FailedStage::Fetching, .. }));
        assert_eq!(
            drain(&mut h.observer),
            vec![
                BroadcastEvent::accepted(job_id, "dQw4w9WgXcQ"),
                BroadcastEvent::failed(job_id, GENERIC_FAILURE),
            ]
        );
        assert_eq!(std::fs::read_dir(h.root.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_transcription_failure_releases_artifact() {
        let stt = stt_returning(|| Err(TranscriptionError::ApiRequestFailed("quota".to_string())), 1);
        let mut translator = MockTranslator::new();
        translator.expect_translate().never();
        let mut h = harness(false, stt, translator);

        let outcome = h.pipeline.start(JobRequest::new(URL, None)).unwrap().wait().await.unwrap();

        assert!(matches!(outcome, JobOutcome::Failed { stage: FailedStage::Transcribing, .. }));
        let written = h.written.lock().unwrap().clone();
        assert_eq!(written.len(), 1);
        assert!(!written[0].exists());
        assert_eq!(drain(&mut h.observer).iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_empty_transcript_completes_without_translation() {
        let mut translator = MockTranslator::new();
        translator.expect_translate().never();
        let mut h = harness(false, stt_returning(|| Ok("   ".to_string()), 1), translator);

        let outcome = h.pipeline.start(JobRequest::new(URL, None)).unwrap().wait().await.unwrap();

        assert_eq!(
            outcome,
            JobOutcome::Completed {
                original_text: String::new(),
                translated_text: String::new(),
            }
        );
        assert!(drain(&mut h.observer).last().unwrap().is_terminal());
    }

    #[tokio::test]
    async fn test_translation_failure_uses_original_text() {
        let mut translator = MockTranslator::new();
        translator.expect_provider_name().return_const("mock");
        translator
            .expect_translate()
            .returning(|_, _| Err(TranslationError::ApiRequestFailed("500".to_string())));
        let mut h = harness(false, stt_returning(|| Ok("merhaba".to_string()), 1), translator);

        let handle = h.pipeline.start(JobRequest::new(URL, Some("ar".into()))).unwrap();
        let job_id = handle.job_id;
        handle.wait().await.unwrap();

        assert_eq!(
            drain(&mut h.observer).pop(),
            Some(BroadcastEvent::completed(job_id, "merhaba", "merhaba"))
        );
    }

    #[tokio::test]
    async fn test_transcription_retries_are_bounded() {
        let stt = stt_returning(|| Err(TranscriptionError::TimedOut(1)), 3);
        let h = harness(false, stt, MockTranslator::new());
        let pipeline = Arc::new(
            Arc::try_unwrap(h.pipeline)
                .ok()
                .unwrap()
                .with_transcription_attempts(3),
        );

        let outcome = pipeline.start(JobRequest::new(URL, None)).unwrap().wait().await.unwrap();

        assert!(matches!(outcome, JobOutcome::Failed { stage: FailedStage::Transcribing, .. }));
    }

    struct PanickingSpeechToText;

    #[async_trait::async_trait]
    impl crate::transcribe::SpeechToText for PanickingSpeechToText {
        async fn transcribe(&self, _: &[u8], _: &str, _: AudioFormat) -> Result<String, TranscriptionError> {
            panic!("provider bug")
        }

        fn provider_name(&self) -> &'static str {
            "panicking"
        }
    }

    #[tokio::test]
    async fn test_panicking_stage_still_emits_one_terminal_event() {
        let mut h = harness(false, MockSpeechToText::new(), MockTranslator::new());
        let hub = Arc::clone(h.pipeline.hub());
        let fetcher = AudioFetcher::new(
            Arc::new(extractor(false, Arc::clone(&h.written))),
            h.root.path().to_path_buf(),
            Duration::from_secs(5),
        );
        h.pipeline = Arc::new(JobPipeline::new(
            fetcher,
            TranscriptionAdapter::new(Arc::new(PanickingSpeechToText), Duration::from_secs(5)),
            TranslationAdapter::new(Arc::new(MockTranslator::new()), Duration::from_secs(5)),
            hub,
        ));

        let outcome = h.pipeline.start(JobRequest::new(URL, None)).unwrap().wait().await.unwrap();

        assert!(matches!(outcome, JobOutcome::Aborted { .. }));
        let events = drain(&mut h.observer);
        assert_eq!(events.iter().filter(|e| e.is_terminal()).count(), 1);
        assert_eq!(std::fs::read_dir(h.root.path()).unwrap().count(), 0);
        assert_eq!(h.pipeline.active_jobs(), 0);
    }
}
