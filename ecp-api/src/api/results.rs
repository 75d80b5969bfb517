//! Result row endpoints: paginated listing, review snapshot, bulk
//! validation and the project event log

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Extension, Json, Router,
};
use ecp_common::api::{
    EventsResponse, ResultsPage, ReviewSnapshot, UpdatedResponse, ValidationRequest,
};
use serde::Deserialize;
use tracing::info;

use crate::api::auth::require_owned_project;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::db::{events, results};
use crate::error::{ApiError, ApiResult};
use crate::pagination::calculate_pagination;
use crate::services::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ResultsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    pub page_size: Option<i64>,
}

fn default_page() -> i64 {
    1
}

/// GET /api/projects/:id/results
pub async fn list_results(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<ResultsQuery>,
) -> ApiResult<Json<ResultsPage>> {
    let project = require_owned_project(&state.db, &id, &user).await?;

    let total = results::count_rows(&state.db, project.id).await?;
    let pagination = calculate_pagination(total, query.page, query.page_size);
    let rows =
        results::page_rows(&state.db, project.id, pagination.page_size, pagination.offset).await?;

    Ok(Json(ResultsPage {
        rows,
        page: pagination.page,
        page_size: pagination.page_size,
        total,
        total_pages: pagination.total_pages,
    }))
}

/// GET /api/projects/:id/prevalidation
///
/// The project with every row, verification-required rows first.
pub async fn prevalidation(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> ApiResult<Json<ReviewSnapshot>> {
    let project = require_owned_project(&state.db, &id, &user).await?;
    let rows = results::review_rows(&state.db, project.id).await?;
    Ok(Json(ReviewSnapshot { project, rows }))
}

/// POST /api/projects/:id/validation
pub async fn validate_rows(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ValidationRequest>,
) -> ApiResult<Json<UpdatedResponse>> {
    let project = require_owned_project(&state.db, &id, &user).await?;

    if req.ids.is_empty() {
        return Err(ApiError::BadRequest("No ids provided".to_string()));
    }

    let updated = results::set_verification(&state.db, project.id, &req.ids, req.status).await?;
    info!(
        project_id = %project.id,
        requested = req.ids.len(),
        updated,
        status = req.status.as_str(),
        "Verification status updated"
    );

    Ok(Json(UpdatedResponse { updated }))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub limit: Option<i64>,
}

/// GET /api/projects/:id/events
pub async fn list_events(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<EventsQuery>,
) -> ApiResult<Json<EventsResponse>> {
    let project = require_owned_project(&state.db, &id, &user).await?;
    let limit = events::clamp_limit(query.limit);
    let events = events::recent_events(&state.db, project.id, limit).await?;
    Ok(Json(EventsResponse { events }))
}

pub fn result_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:id/results", get(list_results))
        .route("/api/projects/:id/prevalidation", get(prevalidation))
        .route("/api/projects/:id/validation", post(validate_rows))
        .route("/api/projects/:id/events", get(list_events))
}
