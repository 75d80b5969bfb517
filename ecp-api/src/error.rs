//! Error types for ecp-api
//!
//! Every failure leaves the service as `{"error": {"code", "message"}}`
//! with the matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use ecp_common::api::{ErrorBody, ErrorDetail};
use thiserror::Error;
use tracing::error;

use crate::services::{IdentityError, PdfError, RelayError, StorageError};

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Missing or rejected credentials (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not the owner (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// An upstream service answered with a failure (502)
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// ecp-common error
    #[error("Common error: {0}")]
    Common(#[from] ecp_common::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Common(ecp_common::Error::InvalidInput(_)) => StatusCode::BAD_REQUEST,
            ApiError::Common(ecp_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) | ApiError::Common(_) | ApiError::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            ApiError::BadRequest(msg) => ("BAD_REQUEST", msg),
            ApiError::Unauthorized(msg) => ("UNAUTHORIZED", msg),
            ApiError::Forbidden(msg) => ("FORBIDDEN", msg),
            ApiError::NotFound(msg) => ("NOT_FOUND", msg),
            ApiError::Upstream(msg) => ("UPSTREAM_ERROR", msg),
            ApiError::Internal(msg) => ("INTERNAL_ERROR", msg),
            ApiError::Common(ecp_common::Error::InvalidInput(msg)) => ("BAD_REQUEST", msg),
            ApiError::Common(ecp_common::Error::NotFound(msg)) => ("NOT_FOUND", msg),
            ApiError::Common(ref err) => ("COMMON_ERROR", err.to_string()),
            ApiError::Database(ref err) => ("DATABASE_ERROR", err.to_string()),
        };

        if status.is_server_error() {
            error!(code, %message, "Request failed");
        }

        let body = Json(ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
            },
        });

        (status, body).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::InvalidInput(msg) => ApiError::BadRequest(msg),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<IdentityError> for ApiError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::InvalidToken => ApiError::Unauthorized("Invalid session".to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::NotConfigured => ApiError::Internal(err.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<PdfError> for ApiError {
    fn from(err: PdfError) -> Self {
        ApiError::Upstream(err.to_string())
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
