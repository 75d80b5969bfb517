//! Bearer-token authentication and project ownership checks
//!
//! Every user endpoint resolves the caller through the identity provider,
//! then re-checks ownership of the project it touches before acting.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use ecp_common::models::Project;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::db::projects;
use crate::error::{ApiError, ApiResult};
use crate::services::User;
use crate::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Authentication middleware
///
/// Resolves the bearer token to a [`User`] and stores it in the request
/// extensions for handlers. Returns 401 when the header is missing or the
/// identity provider rejects the token.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::Unauthorized("Missing bearer token".to_string()))?
        .to_string();

    let user = state
        .services
        .identity
        .user_for_token(&token)
        .await
        .map_err(|e| {
            warn!(error = %e, "Token rejected");
            ApiError::from(e)
        })?;

    debug!(user_id = %user.id, path = %request.uri().path(), "Authenticated request");
    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

/// Load a project and check that `user` owns it
///
/// Unknown or malformed ids are 404, someone else's project is 403.
pub async fn require_owned_project(
    db: &SqlitePool,
    raw_id: &str,
    user: &User,
) -> ApiResult<Project> {
    let not_found = || ApiError::NotFound(format!("Project {}", raw_id));

    let id = Uuid::parse_str(raw_id).map_err(|_| not_found())?;
    let project = projects::get_project(db, id).await?.ok_or_else(not_found)?;

    if project.owner_id != user.id {
        warn!(project_id = %id, user_id = %user.id, "Ownership check failed");
        return Err(ApiError::Forbidden("Not the project owner".to_string()));
    }

    Ok(project)
}
