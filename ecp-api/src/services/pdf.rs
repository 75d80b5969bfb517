//! PDF print service client
//!
//! Hands a self-contained HTML document to a headless-browser print service
//! and returns the rendered A4 PDF.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Print service error {0}: {1}")]
    ApiError(u16, String),

    #[error("Print service returned an empty document")]
    Empty,
}

#[async_trait]
pub trait PdfRenderer: Send + Sync {
    async fn render(&self, html: String) -> Result<Vec<u8>, PdfError>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrintRequest {
    html: String,
    format: &'static str,
    print_background: bool,
    margin: PrintMargin,
}

#[derive(Debug, Serialize)]
struct PrintMargin {
    top: &'static str,
    bottom: &'static str,
    left: &'static str,
    right: &'static str,
}

pub struct HttpPdfRenderer {
    http_client: reqwest::Client,
    url: String,
}

impl HttpPdfRenderer {
    pub fn new(http_client: reqwest::Client, url: &str) -> Self {
        Self {
            http_client,
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl PdfRenderer for HttpPdfRenderer {
    async fn render(&self, html: String) -> Result<Vec<u8>, PdfError> {
        let request = PrintRequest {
            html,
            format: "A4",
            print_background: true,
            margin: PrintMargin {
                top: "18px",
                bottom: "18px",
                left: "26px",
                right: "26px",
            },
        };

        let response = self
            .http_client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| PdfError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PdfError::ApiError(status.as_u16(), body));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PdfError::NetworkError(e.to_string()))?;
        if bytes.is_empty() {
            return Err(PdfError::Empty);
        }

        tracing::debug!(size = bytes.len(), "Rendered PDF");
        Ok(bytes.to_vec())
    }
}
