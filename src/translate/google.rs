use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{TranslationError, Translator};

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    q: &'a str,
    target: &'a str,
    format: &'static str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    data: TranslateData,
}

#[derive(Debug, Deserialize)]
struct TranslateData {
    translations: Vec<Translation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Translation {
    translated_text: String,
}

/// Google Cloud Translation (v2 REST) client
pub struct GoogleTranslateClient {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl GoogleTranslateClient {
    pub fn new(api_key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl Translator for GoogleTranslateClient {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, TranslationError> {
        tracing::debug!(target = %target_language, chars = text.len(), "Sending text to Google Translate");

        let response = self
            .client
            .post(&self.endpoint)
            .query(&[("key", self.api_key.as_str())])
            .json(&TranslateRequest {
                q: text,
                target: target_language,
                format: "text",
            })
            .send()
            .await
            .map_err(|e| TranslationError::ApiRequestFailed(format!("request: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(TranslationError::ApiRequestFailed(format!(
                "status {}: {}",
                status, body
            )));
        }

        let body: TranslateResponse = response
            .json()
            .await
            .map_err(|e| TranslationError::ApiRequestFailed(format!("body: {}", e)))?;

        body.data
            .translations
            .into_iter()
            .next()
            .map(|t| t.translated_text)
            .ok_or(TranslationError::EmptyResponse)
    }

    fn provider_name(&self) -> &'static str {
        "google-translate"
    }
}
