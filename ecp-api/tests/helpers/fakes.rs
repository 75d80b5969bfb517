//! In-process stand-ins for the external collaborators
//!
//! Each fake records what it was asked to do and can be switched to fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use ecp_api::services::{
    BatchNotification, IdentityError, IdentityProvider, ObjectStorage, PdfError, PdfRenderer,
    RelayError, ReprocessPayload, SignedUpload, StorageError, User, WorkflowRelay,
};

pub const ALICE_TOKEN: &str = "alice-token";
pub const BOB_TOKEN: &str = "bob-token";

/// Maps fixed tokens to users
pub struct FakeIdentity {
    users: HashMap<String, User>,
}

impl Default for FakeIdentity {
    fn default() -> Self {
        let mut users = HashMap::new();
        users.insert(
            ALICE_TOKEN.to_string(),
            User {
                id: "alice".to_string(),
                email: Some("alice@example.com".to_string()),
                name: Some("Alice".to_string()),
            },
        );
        users.insert(
            BOB_TOKEN.to_string(),
            User {
                id: "bob".to_string(),
                email: Some("bob@example.com".to_string()),
                name: None,
            },
        );
        Self { users }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentity {
    async fn user_for_token(&self, token: &str) -> Result<User, IdentityError> {
        self.users
            .get(token)
            .cloned()
            .ok_or(IdentityError::InvalidToken)
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<(String, String)>>,
    pub downloads: Mutex<Vec<(String, String, u64)>>,
}

#[async_trait]
impl ObjectStorage for FakeStorage {
    async fn sign_upload(&self, bucket: &str, path: &str) -> Result<SignedUpload, StorageError> {
        self.uploads
            .lock()
            .unwrap()
            .push((bucket.to_string(), path.to_string()));
        Ok(SignedUpload {
            signed_url: format!("https://storage.test/upload/{}/{}?token=tok", bucket, path),
            token: "tok".to_string(),
        })
    }

    async fn sign_download(
        &self,
        bucket: &str,
        path: &str,
        expires_in: u64,
    ) -> Result<String, StorageError> {
        self.downloads
            .lock()
            .unwrap()
            .push((bucket.to_string(), path.to_string(), expires_in));
        Ok(format!("https://storage.test/download/{}/{}", bucket, path))
    }
}

#[derive(Default)]
pub struct FakeRelay {
    pub fail: AtomicBool,
    pub batches: Mutex<Vec<BatchNotification>>,
    pub reprocess: Mutex<Vec<ReprocessPayload>>,
}

impl FakeRelay {
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn outcome(&self) -> Result<(), RelayError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(RelayError::Rejected {
                status: 500,
                body: "workflow down".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl WorkflowRelay for FakeRelay {
    async fn notify_batch(&self, payload: &BatchNotification) -> Result<(), RelayError> {
        self.batches.lock().unwrap().push(payload.clone());
        self.outcome()
    }

    async fn request_reprocess(&self, payload: &ReprocessPayload) -> Result<(), RelayError> {
        self.reprocess.lock().unwrap().push(payload.clone());
        self.outcome()
    }
}

pub const FAKE_PDF: &[u8] = b"%PDF-1.7 fake";

#[derive(Default)]
pub struct FakePdf {
    pub documents: Mutex<Vec<String>>,
}

#[async_trait]
impl PdfRenderer for FakePdf {
    async fn render(&self, html: String) -> Result<Vec<u8>, PdfError> {
        self.documents.lock().unwrap().push(html);
        Ok(FAKE_PDF.to_vec())
    }
}
