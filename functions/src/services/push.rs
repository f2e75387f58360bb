use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::PushConfig;
use crate::error::{AppError, AppResult};

/// One push addressed to a single platform auth account.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PushMessage {
    /// Deterministic id; the messaging platform refuses a second message with the same id.
    pub message_id: String,
    pub title: String,
    pub body: String,
    pub users: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Delivery seam to the managed push messaging API.
#[async_trait]
pub trait PushSender: Send + Sync + 'static {
    async fn send_push(&self, message: &PushMessage) -> AppResult<()>;
}

/// Build a message id that is stable for (purpose, subject, user).
///
/// Ids are 32 lowercase hex chars, which satisfies the platform's id rules
/// (at most 36 chars, alphanumeric first char).
pub fn dedupe_message_id(purpose: &str, subject_id: &str, user_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(purpose.as_bytes());
    hasher.update([0u8]);
    hasher.update(subject_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(user_id.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..32].to_string()
}

/// Pull a readable message out of an error response body.
///
/// Tries the platform's `{"message": ..}` shape, then a generic `{"error": ..}`
/// (string or object with `message`), then falls back to the raw text.
pub fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(msg) = value.get("message").and_then(|m| m.as_str()) {
            return msg.to_string();
        }
        match value.get("error") {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(obj) => {
                if let Some(msg) = obj.get("message").and_then(|m| m.as_str()) {
                    return msg.to_string();
                }
            }
            None => {}
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response body".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}

/// Sends pushes through the messaging REST API (`POST /messaging/messages/push`).
#[derive(Clone)]
pub struct HttpPushSender {
    http: reqwest::Client,
    url: String,
    project_id: String,
    api_key: String,
}

impl HttpPushSender {
    pub fn new(config: &PushConfig) -> AppResult<Self> {
        let endpoint = config
            .endpoint
            .as_deref()
            .ok_or_else(|| AppError::Config("PUSH_ENDPOINT is not set".to_string()))?;
        let base = url::Url::parse(endpoint)
            .map_err(|e| AppError::Config(format!("Invalid PUSH_ENDPOINT: {}", e)))?;

        let project_id = config
            .project_id
            .clone()
            .ok_or_else(|| AppError::Config("PUSH_PROJECT_ID is not set".to_string()))?;
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| AppError::Config("PUSH_API_KEY is not set".to_string()))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            http,
            url: format!(
                "{}/messaging/messages/push",
                base.as_str().trim_end_matches('/')
            ),
            project_id,
            api_key,
        })
    }
}

#[async_trait]
impl PushSender for HttpPushSender {
    async fn send_push(&self, message: &PushMessage) -> AppResult<()> {
        let response = self
            .http
            .post(&self.url)
            .header("X-Appwrite-Project", &self.project_id)
            .header("X-Appwrite-Key", &self.api_key)
            .json(message)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(
                "Push {} accepted for {} user(s)",
                message.message_id,
                message.users.len()
            );
            return Ok(());
        }

        // The id already exists: this exact push was delivered on an earlier run.
        if status == reqwest::StatusCode::CONFLICT {
            tracing::info!(
                "Push {} was already delivered; skipping duplicate",
                message.message_id
            );
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(AppError::Push(format!(
            "Messaging API error ({}): {}",
            status.as_u16(),
            extract_error_message(&body)
        )))
    }
}

/// Fallback used when no messaging endpoint is configured: pushes are only logged.
#[derive(Clone, Default)]
pub struct LogPushSender;

#[async_trait]
impl PushSender for LogPushSender {
    async fn send_push(&self, message: &PushMessage) -> AppResult<()> {
        tracing::info!(
            "Push (not delivered, no endpoint configured) id={} users={:?} title={:?}",
            message.message_id,
            message.users,
            message.title
        );
        Ok(())
    }
}
