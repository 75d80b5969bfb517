//! Single-row reprocessing
//!
//! Rows are marked `processing` before the automation is asked to recompute
//! them; the automation reports back through the secret-authenticated
//! callback. A rejected request rolls the rows to `failed`.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    routing::post,
    Extension, Json, Router,
};
use ecp_common::api::{
    secrets_match, OkResponse, ReprocessCallback, ReprocessRequest, ReprocessResponse,
};
use ecp_common::models::ReprocessStatus;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::auth::require_owned_project;
use crate::api::extract::{parse_body, ApiJson};
use crate::db::{projects, results};
use crate::error::{ApiError, ApiResult};
use crate::services::{RelayUser, ReprocessPayload, ReprocessPayloadItem, User};
use crate::AppState;

/// Header carrying the reprocess callback secret
pub const REPROCESS_SECRET_HEADER: &str = "x-reprocess-secret";

/// POST /api/projects/:id/reprocess
pub async fn request_reprocess(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ReprocessRequest>,
) -> ApiResult<Json<ReprocessResponse>> {
    let project = require_owned_project(&state.db, &id, &user).await?;

    if req.items.is_empty() {
        return Err(ApiError::BadRequest(
            "Invalid payload: expected { items: [...] }".to_string(),
        ));
    }

    let ids: Vec<i64> = req.items.iter().map(|item| item.id).collect();
    results::mark_reprocessing(&state.db, project.id, &ids).await?;

    let payload = ReprocessPayload {
        project_id: project.id,
        callback_url: format!(
            "{}/api/projects/{}/reprocess/callback",
            state.config.app_base_url, project.id
        ),
        user: RelayUser {
            id: user.id.clone(),
            email: user.email.clone(),
            name: user.name.clone(),
        },
        items: req
            .items
            .into_iter()
            .map(|item| ReprocessPayloadItem {
                id: item.id,
                category: item.category,
                hint: item.hint,
            })
            .collect(),
    };

    if let Err(e) = state.services.relay.request_reprocess(&payload).await {
        error!(project_id = %project.id, rows = ids.len(), error = %e, "Reprocess request failed");
        results::set_reprocess_status(&state.db, project.id, &ids, ReprocessStatus::Failed).await?;
        return Err(e.into());
    }

    info!(project_id = %project.id, rows = ids.len(), user_id = %user.id, "Reprocess queued");
    Ok(Json(ReprocessResponse { queued: ids.len() }))
}

/// POST /api/projects/:id/reprocess/callback
///
/// Authenticated by the `x-reprocess-secret` header before the body is read.
/// Recomputed values and statuses are written in one transaction.
pub async fn reprocess_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<OkResponse>> {
    let provided = headers
        .get(REPROCESS_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !secrets_match(provided, &state.config.reprocess_callback_secret) {
        warn!(project = %id, "Reprocess callback rejected");
        return Err(ApiError::Unauthorized("Invalid callback secret".to_string()));
    }
    let body: ReprocessCallback = parse_body(&body)?;

    let project_id =
        Uuid::parse_str(&id).map_err(|_| ApiError::NotFound(format!("Project {}", id)))?;
    if projects::get_project(&state.db, project_id).await?.is_none() {
        return Err(ApiError::NotFound(format!("Project {}", id)));
    }

    if body.ids.is_empty() {
        return Err(ApiError::BadRequest("Missing ids".to_string()));
    }
    if body.status == ReprocessStatus::Empty {
        return Err(ApiError::BadRequest(
            "Invalid status. Allowed: processing, done, failed".to_string(),
        ));
    }

    let updated =
        results::apply_reprocess_report(&state.db, project_id, &body.ids, &body.updates, body.status)
            .await?;

    info!(
        %project_id,
        updated,
        recomputed = body.updates.len(),
        status = body.status.as_str(),
        "Reprocess callback applied"
    );
    Ok(Json(OkResponse::ok()))
}

pub fn reprocess_routes() -> Router<AppState> {
    Router::new().route("/api/projects/:id/reprocess", post(request_reprocess))
}

pub fn reprocess_callback_routes() -> Router<AppState> {
    Router::new().route(
        "/api/projects/:id/reprocess/callback",
        post(reprocess_callback),
    )
}
