//! Storage signing gateway
//!
//! Issues short-lived signed URLs so the browser can upload spreadsheets
//! directly to object storage, and so the automation can read them back.

use axum::{extract::State, routing::post, Extension, Json, Router};
use ecp_common::api::{
    SignDownloadRequest, SignDownloadResponse, SignUploadRequest, SignUploadResponse,
};
use tracing::info;
use uuid::Uuid;

use crate::api::extract::ApiJson;
use crate::error::{ApiError, ApiResult};
use crate::services::storage::{
    build_upload_path, upload_extension, validate_object_path, DOWNLOAD_URL_TTL_SECS,
};
use crate::services::User;
use crate::AppState;

/// POST /api/storage/sign-upload
pub async fn sign_upload(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiJson(req): ApiJson<SignUploadRequest>,
) -> ApiResult<Json<SignUploadResponse>> {
    let ext = upload_extension(req.filename.trim())?;
    let path = build_upload_path(
        req.project_name.as_deref(),
        req.batch_id.as_deref(),
        req.tag.as_deref(),
        &ext,
        Uuid::new_v4(),
    );
    let bucket = state.config.storage_bucket.clone();

    let signed = state.services.storage.sign_upload(&bucket, &path).await?;
    info!(user_id = %user.id, %bucket, %path, "Signed upload");

    Ok(Json(SignUploadResponse {
        bucket,
        path,
        signed_url: signed.signed_url,
        token: signed.token,
    }))
}

/// POST /api/storage/sign-download
///
/// Only objects of the configured bucket can be signed.
pub async fn sign_download(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiJson(req): ApiJson<SignDownloadRequest>,
) -> ApiResult<Json<SignDownloadResponse>> {
    let bucket = req
        .bucket
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| state.config.storage_bucket.clone());
    if bucket != state.config.storage_bucket {
        return Err(ApiError::Forbidden(format!("Bucket not allowed: {}", bucket)));
    }

    let path = req.path.trim().to_string();
    validate_object_path(&path)?;

    let signed_url = state
        .services
        .storage
        .sign_download(&bucket, &path, DOWNLOAD_URL_TTL_SECS)
        .await?;
    info!(user_id = %user.id, %bucket, %path, "Signed download");

    Ok(Json(SignDownloadResponse {
        bucket,
        path,
        signed_url,
        expires_in: DOWNLOAD_URL_TTL_SECS,
    }))
}

pub fn storage_routes() -> Router<AppState> {
    Router::new()
        .route("/api/storage/sign-upload", post(sign_upload))
        .route("/api/storage/sign-download", post(sign_download))
}
