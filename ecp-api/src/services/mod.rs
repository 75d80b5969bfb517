//! Clients for the external collaborators
//!
//! Each collaborator sits behind a trait so handlers can be exercised
//! against in-process fakes.

pub mod identity;
pub mod pdf;
pub mod relay;
pub mod storage;

pub use identity::{HttpIdentityProvider, IdentityError, IdentityProvider, User};
pub use pdf::{HttpPdfRenderer, PdfError, PdfRenderer};
pub use relay::{
    BatchNotification, HttpWorkflowRelay, RelayError, RelayUser, ReprocessPayload,
    ReprocessPayloadItem, SignedFile, WorkflowRelay,
};
pub use storage::{HttpObjectStorage, ObjectStorage, SignedUpload, StorageError};

use std::sync::Arc;
use std::time::Duration;

use ecp_common::config::AppConfig;

pub(crate) const USER_AGENT: &str = concat!("ECP/", env!("CARGO_PKG_VERSION"));
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound collaborators used by the handlers
#[derive(Clone)]
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub storage: Arc<dyn ObjectStorage>,
    pub relay: Arc<dyn WorkflowRelay>,
    pub pdf: Arc<dyn PdfRenderer>,
}

impl Services {
    /// HTTP-backed collaborators from configuration
    pub fn http(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            identity: Arc::new(HttpIdentityProvider::new(
                http.clone(),
                &config.storage_url,
                &config.storage_anon_key,
            )),
            storage: Arc::new(HttpObjectStorage::new(
                http.clone(),
                &config.storage_url,
                &config.storage_service_key,
            )),
            relay: Arc::new(HttpWorkflowRelay::new(
                http.clone(),
                &config.notify_webhook_url,
                &config.reprocess_webhook_url,
                &config.webhook_secret,
            )),
            pdf: Arc::new(HttpPdfRenderer::new(http, &config.pdf_renderer_url)),
        })
    }
}
