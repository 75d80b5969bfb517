//! Workflow relay
//!
//! Forwards batch notifications and reprocessing requests to the automation
//! webhooks. Any non-2xx answer is a hard failure the caller must compensate.

use async_trait::async_trait;
use ecp_common::models::ActivityCategory;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Header carrying the shared secret on outbound webhook calls
pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("n8n error {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Webhook URL not configured")]
    NotConfigured,
}

/// A file reference with a download URL the automation can fetch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedFile {
    pub bucket: String,
    pub path: String,
    pub original_name: Option<String>,
    pub tag: Option<String>,
    pub download_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchNotification {
    pub project_id: Uuid,
    pub batch_id: String,
    pub files: Vec<SignedFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayUser {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

/// Row to recompute, keyed the way the automation workflow reads it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprocessPayloadItem {
    pub id: i64,
    #[serde(rename = "catégorie")]
    pub category: ActivityCategory,
    #[serde(rename = "texte")]
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessPayload {
    pub project_id: Uuid,
    pub callback_url: String,
    pub user: RelayUser,
    pub items: Vec<ReprocessPayloadItem>,
}

#[async_trait]
pub trait WorkflowRelay: Send + Sync {
    async fn notify_batch(&self, payload: &BatchNotification) -> Result<(), RelayError>;

    async fn request_reprocess(&self, payload: &ReprocessPayload) -> Result<(), RelayError>;
}

pub struct HttpWorkflowRelay {
    http_client: reqwest::Client,
    notify_url: String,
    reprocess_url: String,
    secret: String,
}

impl HttpWorkflowRelay {
    pub fn new(
        http_client: reqwest::Client,
        notify_url: &str,
        reprocess_url: &str,
        secret: &str,
    ) -> Self {
        Self {
            http_client,
            notify_url: notify_url.to_string(),
            reprocess_url: reprocess_url.to_string(),
            secret: secret.to_string(),
        }
    }

    async fn post<T: Serialize + Sync>(&self, url: &str, payload: &T) -> Result<(), RelayError> {
        if url.is_empty() {
            return Err(RelayError::NotConfigured);
        }

        let response = self
            .http_client
            .post(url)
            .header(WEBHOOK_SECRET_HEADER, &self.secret)
            .json(payload)
            .send()
            .await
            .map_err(|e| RelayError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), url, "Webhook rejected request");
            return Err(RelayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(())
    }
}

#[async_trait]
impl WorkflowRelay for HttpWorkflowRelay {
    async fn notify_batch(&self, payload: &BatchNotification) -> Result<(), RelayError> {
        tracing::info!(
            project_id = %payload.project_id,
            batch_id = %payload.batch_id,
            files = payload.files.len(),
            "Relaying batch to automation"
        );
        self.post(&self.notify_url, payload).await
    }

    async fn request_reprocess(&self, payload: &ReprocessPayload) -> Result<(), RelayError> {
        tracing::info!(
            project_id = %payload.project_id,
            items = payload.items.len(),
            "Relaying reprocess request to automation"
        );
        self.post(&self.reprocess_url, payload).await
    }
}
