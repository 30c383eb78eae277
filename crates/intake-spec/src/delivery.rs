use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::spec::form::FormSpec;
use crate::store::AnswerStore;

/// Failures while transmitting a finished report. Never fatal to the
/// respondent; the session records them as [`DeliveryStatus::Failed`].
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery request failed: {0}")]
    Network(String),
    #[error("delivery endpoint answered {status}: {body}")]
    Status { status: u16, body: String },
    #[error("delivery payload could not be encoded: {0}")]
    Encode(String),
    #[error("unsupported delivery method '{0}'")]
    Method(String),
}

/// Body posted to the configured webhook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryPayload {
    pub timestamp: String,
    pub title: String,
    pub report_text: String,
    pub responses: Value,
    pub metadata: DeliveryMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryMetadata {
    pub total_questions: usize,
    pub completed_at: String,
    pub client_info: String,
}

impl DeliveryPayload {
    pub fn new(
        spec: &FormSpec,
        store: &AnswerStore,
        report_text: &str,
        completed_at: DateTime<Utc>,
        client_info: &str,
    ) -> Self {
        let stamp = completed_at.to_rfc3339_opts(SecondsFormat::Millis, true);
        Self {
            timestamp: stamp.clone(),
            title: spec.title.clone(),
            report_text: report_text.to_string(),
            responses: store.to_value(),
            metadata: DeliveryMetadata {
                total_questions: spec.questions.len(),
                completed_at: stamp,
                client_info: client_info.to_string(),
            },
        }
    }
}

/// Destination for finished reports.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, payload: &DeliveryPayload) -> Result<(), DeliveryError>;
}

/// Outcome of the optional delivery step, kept so operators can tell a
/// silent failure apart from success.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Skipped,
    Delivered,
    Failed { reason: String },
}

impl DeliveryStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, DeliveryStatus::Failed { .. })
    }
}
