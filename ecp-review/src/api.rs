//! Client for the review endpoints of ecp-api

use async_trait::async_trait;
use ecp_common::api::{
    ErrorBody, EventsResponse, ReprocessItem, ReprocessRequest, ReprocessResponse, ReviewSnapshot,
    UpdatedResponse, ValidationRequest,
};
use ecp_common::models::{ProjectEvent, VerificationStatus};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::error::{ReviewError, ReviewResult};

const USER_AGENT: &str = concat!("ECP-Review/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[async_trait]
pub trait ReviewApi: Send + Sync {
    /// Project plus every row, verification-required first
    async fn snapshot(&self, project_id: Uuid) -> ReviewResult<ReviewSnapshot>;

    /// Most recent events, oldest first
    async fn events(&self, project_id: Uuid, limit: i64) -> ReviewResult<Vec<ProjectEvent>>;

    /// Mark rows validated; returns how many rows changed
    async fn validate(&self, project_id: Uuid, ids: &[i64]) -> ReviewResult<u64>;

    async fn reprocess(&self, project_id: Uuid, items: Vec<ReprocessItem>) -> ReviewResult<usize>;
}

/// ecp-api over HTTP with a bearer access token
pub struct HttpReviewApi {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
}

impl HttpReviewApi {
    pub fn new(base_url: &str, token: &str) -> ReviewResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ReviewError::NetworkError(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn project_url(&self, project_id: Uuid, tail: &str) -> String {
        format!("{}/api/projects/{}/{}", self.base_url, project_id, tail)
    }

    async fn read<T: DeserializeOwned>(response: reqwest::Response) -> ReviewResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(ReviewError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| ReviewError::ParseError(e.to_string()))
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> ReviewResult<T> {
        let response = self
            .http_client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ReviewError::NetworkError(e.to_string()))?;
        Self::read(response).await
    }

    async fn post<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
    ) -> ReviewResult<T> {
        let response = self
            .http_client
            .post(url)
            .bearer_auth(&self.token)
            .json(body)
            .send()
            .await
            .map_err(|e| ReviewError::NetworkError(e.to_string()))?;
        Self::read(response).await
    }
}

#[async_trait]
impl ReviewApi for HttpReviewApi {
    async fn snapshot(&self, project_id: Uuid) -> ReviewResult<ReviewSnapshot> {
        self.get(&self.project_url(project_id, "prevalidation")).await
    }

    async fn events(&self, project_id: Uuid, limit: i64) -> ReviewResult<Vec<ProjectEvent>> {
        let url = format!("{}?limit={}", self.project_url(project_id, "events"), limit);
        let response: EventsResponse = self.get(&url).await?;
        Ok(response.events)
    }

    async fn validate(&self, project_id: Uuid, ids: &[i64]) -> ReviewResult<u64> {
        let body = ValidationRequest {
            ids: ids.to_vec(),
            status: VerificationStatus::Validated,
        };
        let response: UpdatedResponse = self
            .post(&self.project_url(project_id, "validation"), &body)
            .await?;
        Ok(response.updated)
    }

    async fn reprocess(&self, project_id: Uuid, items: Vec<ReprocessItem>) -> ReviewResult<usize> {
        let body = ReprocessRequest { items };
        let response: ReprocessResponse = self
            .post(&self.project_url(project_id, "reprocess"), &body)
            .await?;
        Ok(response.queued)
    }
}
