#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use video_translator::extractors::ExtractError;
use video_translator::server::{create_router, AppState};
use video_translator::transcribe::TranscriptionError;
use video_translator::translate::TranslationError;
use video_translator::{
    AudioExtractor, AudioFetcher, AudioFormat, BroadcastEvent, BroadcastHub, JobPipeline, Observer,
    SpeechToText, TranscriptionAdapter, TranslationAdapter, Translator,
};

/// Writes the requested URL as the "audio" so later stages can tell jobs apart
#[derive(Default)]
pub struct FakeExtractor {
    pub fail: bool,
    pub delay: Duration,
    pub written: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl AudioExtractor for FakeExtractor {
    async fn extract_audio(&self, url: &str, output_path: &Path) -> Result<(), ExtractError> {
        self.written.lock().unwrap().push(output_path.to_path_buf());
        tokio::time::sleep(self.delay).await;

        if self.fail {
            return Err(ExtractError::Failed("video unavailable".to_string()));
        }
        tokio::fs::write(output_path, url.as_bytes()).await?;
        Ok(())
    }

    fn output_format(&self) -> AudioFormat {
        AudioFormat::Mp3
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

pub struct EchoSpeechToText;

#[async_trait]
impl SpeechToText for EchoSpeechToText {
    async fn transcribe(&self, audio: &[u8], _: &str, _: AudioFormat) -> Result<String, TranscriptionError> {
        Ok(format!("transcript of {}", String::from_utf8_lossy(audio)))
    }

    fn provider_name(&self) -> &'static str {
        "echo"
    }
}

pub struct TaggingTranslator;

#[async_trait]
impl Translator for TaggingTranslator {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, TranslationError> {
        Ok(format!("[{}] {}", target_language, text))
    }

    fn provider_name(&self) -> &'static str {
        "tagging"
    }
}

pub struct TestApp {
    pub pipeline: Arc<JobPipeline>,
    pub hub: Arc<BroadcastHub>,
    pub extractor: Arc<FakeExtractor>,
    pub temp_root: TempDir,
}

impl TestApp {
    pub fn new(extractor: FakeExtractor) -> Self {
        let temp_root = TempDir::new().unwrap();
        let extractor = Arc::new(extractor);
        let hub = Arc::new(BroadcastHub::default());

        let pipeline = JobPipeline::new(
            AudioFetcher::new(extractor.clone(), temp_root.path().to_path_buf(), Duration::from_secs(5)),
            TranscriptionAdapter::new(Arc::new(EchoSpeechToText), Duration::from_secs(5)),
            TranslationAdapter::new(Arc::new(TaggingTranslator), Duration::from_secs(5)),
            Arc::clone(&hub),
        );

        Self {
            pipeline: Arc::new(pipeline),
            hub,
            extractor,
            temp_root,
        }
    }

    pub fn router(&self) -> axum::Router {
        create_router(AppState::new(Arc::clone(&self.pipeline)), None)
    }

    pub fn leftover_entries(&self) -> usize {
        std::fs::read_dir(self.temp_root.path()).unwrap().count()
    }
}

/// Collect events until `terminal` terminal events have arrived
pub async fn collect_until_terminal(observer: &mut Observer, terminal: usize) -> Vec<BroadcastEvent> {
    let mut events = Vec::new();
    let mut seen = 0;

    while seen < terminal {
        let event = tokio::time::timeout(Duration::from_secs(5), observer.recv())
            .await
            .expect("timed out waiting for events")
            .expect("hub closed");
        if event.is_terminal() {
            seen += 1;
        }
        events.push(event);
    }

    events
}
