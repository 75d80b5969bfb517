//! Identity provider client
//!
//! Resolves a bearer access token to the user it was issued to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Invalid or expired token")]
    InvalidToken,

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Identity API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub name: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn user_for_token(&self, token: &str) -> Result<User, IdentityError>;
}

#[derive(Debug, Deserialize)]
struct AuthUserResponse {
    id: String,
    email: Option<String>,
    #[serde(default)]
    user_metadata: UserMetadata,
}

#[derive(Debug, Default, Deserialize)]
struct UserMetadata {
    name: Option<String>,
    full_name: Option<String>,
}

/// `GET {base}/auth/v1/user` with the caller's token
pub struct HttpIdentityProvider {
    http_client: reqwest::Client,
    user_url: String,
    anon_key: String,
}

impl HttpIdentityProvider {
    pub fn new(http_client: reqwest::Client, base_url: &str, anon_key: &str) -> Self {
        Self {
            http_client,
            user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn user_for_token(&self, token: &str) -> Result<User, IdentityError> {
        let response = self
            .http_client
            .get(&self.user_url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::NetworkError(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(IdentityError::InvalidToken);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IdentityError::ApiError(status.as_u16(), body));
        }

        let parsed: AuthUserResponse = response
            .json()
            .await
            .map_err(|e| IdentityError::ParseError(e.to_string()))?;

        tracing::debug!(user_id = %parsed.id, "Resolved access token");

        Ok(User {
            id: parsed.id,
            email: parsed.email,
            name: parsed.user_metadata.name.or(parsed.user_metadata.full_name),
        })
    }
}
