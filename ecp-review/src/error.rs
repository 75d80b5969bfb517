//! Error types for the review client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Non-2xx answer; `message` comes from the `{"error": {...}}` body when present
    #[error("API error {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type ReviewResult<T> = Result<T, ReviewError>;
