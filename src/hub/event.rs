use serde::{Deserialize, Serialize};

use crate::pipeline::JobId;

/// Payload pushed to every observer. Serialized without a tag, camelCase fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BroadcastEvent {
    /// The job passed parsing and started fetching audio
    #[serde(rename_all = "camelCase")]
    Accepted {
        job_id: JobId,
        video_id: String,
        loading: bool,
    },

    /// Terminal success
    #[serde(rename_all = "camelCase")]
    Completed {
        job_id: JobId,
        original_text: String,
        translated_text: String,
        loading: bool,
    },

    /// Terminal failure
    #[serde(rename_all = "camelCase")]
    Failed {
        job_id: JobId,
        error: String,
        loading: bool,
    },
}

impl BroadcastEvent {
    pub fn accepted(job_id: JobId, video_id: impl Into<String>) -> Self {
        Self::Accepted {
            job_id,
            video_id: video_id.into(),
            loading: true,
        }
    }

    pub fn completed(job_id: JobId, original_text: impl Into<String>, translated_text: impl Into<String>) -> Self {
        Self::Completed {
            job_id,
            original_text: original_text.into(),
            translated_text: translated_text.into(),
            loading: false,
        }
    }

    pub fn failed(job_id: JobId, error: impl Into<String>) -> Self {
        Self::Failed {
            job_id,
            error: error.into(),
            loading: false,
        }
    }

    pub fn job_id(&self) -> JobId {
        match self {
            Self::Accepted { job_id, .. } | Self::Completed { job_id, .. } | Self::Failed { job_id, .. } => *job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Accepted { .. })
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
