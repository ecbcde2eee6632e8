use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod google;

pub use google::GoogleTranslateClient;

/// Errors reported by a translation provider
#[derive(Debug, thiserror::Error)]
pub enum TranslationError {
    #[error("api request failed: {0}")]
    ApiRequestFailed(String),

    #[error("provider returned no translation")]
    EmptyResponse,

    #[error("translation timed out after {0}s")]
    TimedOut(u64),
}

/// Machine translation provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str, target_language: &str) -> Result<String, TranslationError>;

    /// Get the name of this provider
    fn provider_name(&self) -> &'static str;
}

/// Translation stage of the pipeline. Never fails: provider errors yield the input text.
pub struct TranslationAdapter {
    provider: Arc<dyn Translator>,
    timeout: Duration,
}

impl TranslationAdapter {
    pub fn new(provider: Arc<dyn Translator>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub async fn translate(&self, text: &str, target_language: &str) -> String {
        if text.trim().is_empty() {
            return text.to_string();
        }

        match self.try_translate(text, target_language).await {
            Ok(translated) => translated,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    provider = self.provider.provider_name(),
                    target = %target_language,
                    "Translation failed, using original text"
                );
                text.to_string()
            }
        }
    }

    async fn try_translate(&self, text: &str, target_language: &str) -> Result<String, TranslationError> {
        tokio::time::timeout(self.timeout, self.provider.translate(text, target_language))
            .await
            .map_err(|_| TranslationError::TimedOut(self.timeout.as_secs()))?
    }
}
