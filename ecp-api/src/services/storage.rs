//! Object storage signing client
//!
//! Issues short-lived signed URLs so browsers upload and the automation
//! downloads without ever holding storage credentials.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Lifetime of signed download URLs, in seconds
pub const DOWNLOAD_URL_TTL_SECS: u64 = 600;

/// Spreadsheet extensions accepted for upload
pub const ALLOWED_EXTENSIONS: [&str; 3] = ["xlsx", "xls", "xlsb"];

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Storage API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedUpload {
    pub signed_url: String,
    pub token: String,
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn sign_upload(&self, bucket: &str, path: &str) -> Result<SignedUpload, StorageError>;

    async fn sign_download(
        &self,
        bucket: &str,
        path: &str,
        expires_in: u64,
    ) -> Result<String, StorageError>;
}

// ========================================
// Path helpers
// ========================================

/// Sanitize a free-form path segment
///
/// Lowercase, whitespace runs become `_`, anything outside `[a-z0-9_-]`
/// becomes `_`. Blank input falls back to `default`.
pub fn sanitize_segment(input: Option<&str>, default: &str) -> String {
    let raw = input.map(str::trim).unwrap_or("");
    if raw.is_empty() {
        return default.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut in_space = false;
    for c in raw.to_lowercase().chars() {
        if c.is_whitespace() {
            if !in_space {
                out.push('_');
            }
            in_space = true;
            continue;
        }
        in_space = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            out.push(c);
        } else {
            out.push('_');
        }
    }
    out
}

/// Lowercased extension of an allowed spreadsheet file
pub fn upload_extension(filename: &str) -> Result<String, StorageError> {
    let ext = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    if ALLOWED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(ext)
    } else {
        Err(StorageError::InvalidInput(format!(
            "Unsupported file type: only {} are accepted",
            ALLOWED_EXTENSIONS.map(|e| format!(".{}", e)).join(", ")
        )))
    }
}

/// `uploads/<project>/<batch>/<tag>/<uuid>.<ext>`
pub fn build_upload_path(
    project_name: Option<&str>,
    batch_id: Option<&str>,
    tag: Option<&str>,
    ext: &str,
    object_id: Uuid,
) -> String {
    format!(
        "uploads/{}/{}/{}/{}.{}",
        sanitize_segment(project_name, "sans_nom"),
        sanitize_segment(batch_id, "no_batch"),
        sanitize_segment(tag, "untagged"),
        object_id,
        ext
    )
}

/// Reject empty paths, absolute paths and parent-directory segments
pub fn validate_object_path(path: &str) -> Result<(), StorageError> {
    let path = path.trim();
    if path.is_empty() {
        return Err(StorageError::InvalidInput("Missing path".to_string()));
    }
    if path.starts_with('/') || path.split('/').any(|seg| seg == "..") {
        return Err(StorageError::InvalidInput(format!("Invalid path: {}", path)));
    }
    Ok(())
}

// ========================================
// HTTP client
// ========================================

#[derive(Debug, Deserialize)]
struct UploadSignResponse {
    url: String,
}

#[derive(Debug, Deserialize)]
struct DownloadSignResponse {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

/// Storage REST API (`{base}/storage/v1`) authenticated with the service key
pub struct HttpObjectStorage {
    http_client: reqwest::Client,
    storage_base: String,
    service_key: String,
}

impl HttpObjectStorage {
    pub fn new(http_client: reqwest::Client, base_url: &str, service_key: &str) -> Self {
        Self {
            http_client,
            storage_base: format!("{}/storage/v1", base_url.trim_end_matches('/')),
            service_key: service_key.to_string(),
        }
    }

    async fn post_json<T: for<'de> Deserialize<'de>>(
        &self,
        url: String,
        body: serde_json::Value,
    ) -> Result<T, StorageError> {
        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| StorageError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::ApiError(status.as_u16(), body));
        }

        response
            .json()
            .await
            .map_err(|e| StorageError::ParseError(e.to_string()))
    }
}

#[async_trait]
impl ObjectStorage for HttpObjectStorage {
    async fn sign_upload(&self, bucket: &str, path: &str) -> Result<SignedUpload, StorageError> {
        let url = format!("{}/object/upload/sign/{}/{}", self.storage_base, bucket, path);
        let parsed: UploadSignResponse = self.post_json(url, json!({})).await?;

        let token = parsed
            .url
            .split_once('?')
            .and_then(|(_, query)| {
                query
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("token="))
            })
            .map(str::to_string)
            .ok_or_else(|| StorageError::ParseError("Signed upload URL has no token".to_string()))?;

        tracing::info!(bucket, path, "Signed upload URL");

        Ok(SignedUpload {
            signed_url: format!("{}{}", self.storage_base, parsed.url),
            token,
        })
    }

    async fn sign_download(
        &self,
        bucket: &str,
        path: &str,
        expires_in: u64,
    ) -> Result<String, StorageError> {
        let url = format!("{}/object/sign/{}/{}", self.storage_base, bucket, path);
        let parsed: DownloadSignResponse =
            self.post_json(url, json!({ "expiresIn": expires_in })).await?;

        tracing::debug!(bucket, path, expires_in, "Signed download URL");

        Ok(format!("{}{}", self.storage_base, parsed.signed_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment(Some("Chantier Nord 2025"), "x"), "chantier_nord_2025");
        assert_eq!(sanitize_segment(Some("Été / Lot#3"), "x"), "_t____lot_3");
        assert_eq!(sanitize_segment(Some("a   b"), "x"), "a_b");
        assert_eq!(sanitize_segment(Some("   "), "sans_nom"), "sans_nom");
        assert_eq!(sanitize_segment(None, "untagged"), "untagged");
    }

    #[test]
    fn test_upload_extension_allow_list() {
        assert_eq!(upload_extension("Fournisseurs.XLSX").unwrap(), "xlsx");
        assert_eq!(upload_extension("a.b.xls").unwrap(), "xls");
        assert_eq!(upload_extension("data.xlsb").unwrap(), "xlsb");
        assert!(upload_extension("data.csv").is_err());
        assert!(upload_extension("noextension").is_err());
    }

    #[test]
    fn test_build_upload_path_defaults() {
        let id = Uuid::nil();
        assert_eq!(
            build_upload_path(None, None, None, "xlsx", id),
            format!("uploads/sans_nom/no_batch/untagged/{}.xlsx", id)
        );
        assert_eq!(
            build_upload_path(Some("Test"), Some("2025-01-01_ab12cd34"), Some("fournisseurs"), "xls", id),
            format!("uploads/test/2025-01-01_ab12cd34/fournisseurs/{}.xls", id)
        );
    }

    #[test]
    fn test_validate_object_path() {
        assert!(validate_object_path("uploads/test/file.xlsx").is_ok());
        assert!(validate_object_path("").is_err());
        assert!(validate_object_path("/etc/passwd").is_err());
        assert!(validate_object_path("uploads/../secrets").is_err());
    }
}
