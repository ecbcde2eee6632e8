use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;

use super::{SpeechToText, TranscriptionError};
use crate::extractors::AudioFormat;

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
}

/// OpenAI-compatible Whisper transcription client
pub struct WhisperClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl WhisperClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        }
    }
}

#[async_trait]
impl SpeechToText for WhisperClient {
    async fn transcribe(
        &self,
        audio: &[u8],
        file_name: &str,
        format: AudioFormat,
    ) -> Result<String, TranscriptionError> {
        let url = format!("{}/audio/transcriptions", self.base_url);

        let file_part = multipart::Part::bytes(audio.to_vec())
            .file_name(file_name.to_string())
            .mime_str(format.mime_type())
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("mime: {}", e)))?;

        let form = multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file_part);

        tracing::debug!(model = %self.model, "Sending audio to Whisper API");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranscriptionError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let body: WhisperResponse = response
            .json()
            .await
            .map_err(|e| TranscriptionError::ApiRequestFailed(format!("body: {}", e)))?;

        tracing::info!(chars = body.text.len(), "Whisper transcription completed");

        Ok(body.text)
    }

    fn provider_name(&self) -> &'static str {
        "whisper"
    }
}
