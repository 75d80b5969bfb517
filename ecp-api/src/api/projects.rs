//! Project registry endpoints
//!
//! Create, list, rename/archive and lock projects, and hand uploaded files
//! to the automation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, patch, post},
    Extension, Json, Router,
};
use chrono::Utc;
use ecp_common::api::{
    CreateProjectRequest, CreateProjectResponse, NotifyRequest, OkResponse, PatchProjectRequest,
    ProjectListResponse, ProjectResponse, SetStatusRequest, SetStatusResponse,
};
use ecp_common::models::{new_batch_id, validate_project_name, EventKind, Project, ProjectStatus};
use serde::Deserialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::api::auth::require_owned_project;
use crate::api::extract::{ApiJson, ApiQuery};
use crate::db::{events, projects};
use crate::error::{ApiError, ApiResult};
use crate::services::storage::{validate_object_path, DOWNLOAD_URL_TTL_SECS};
use crate::services::{BatchNotification, SignedFile, User};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Include archived projects
    #[serde(default)]
    pub archived: bool,
}

/// GET /api/projects
pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiQuery(query): ApiQuery<ListQuery>,
) -> ApiResult<Json<ProjectListResponse>> {
    let projects = projects::list_projects(&state.db, &user.id, query.archived).await?;
    Ok(Json(ProjectListResponse { projects }))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    ApiJson(req): ApiJson<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<CreateProjectResponse>)> {
    let name = validate_project_name(&req.name)?;
    let now = Utc::now();

    let project = Project {
        id: Uuid::new_v4(),
        owner_id: user.id.clone(),
        name,
        status: ProjectStatus::Processing,
        batch_id: new_batch_id(now),
        created_at: now,
        archived_at: None,
        created_by_email: user.email.clone(),
    };
    projects::insert_project(&state.db, &project).await?;

    info!(
        project_id = %project.id,
        batch_id = %project.batch_id,
        user_id = %user.id,
        "Project created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CreateProjectResponse {
            project_id: project.id.to_string(),
            batch_id: project.batch_id,
            project_name: project.name,
        }),
    ))
}

/// GET /api/projects/:id
pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> ApiResult<Json<ProjectResponse>> {
    let project = require_owned_project(&state.db, &id, &user).await?;
    Ok(Json(ProjectResponse { project }))
}

/// PATCH /api/projects/:id
///
/// Rename and/or archive (`archived: true`) or restore (`archived: false`).
pub async fn patch_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<PatchProjectRequest>,
) -> ApiResult<Json<ProjectResponse>> {
    if req.name.is_none() && req.archived.is_none() {
        return Err(ApiError::BadRequest(
            "Nothing to update: provide name and/or archived".to_string(),
        ));
    }

    let project = require_owned_project(&state.db, &id, &user).await?;

    // Validate everything before writing anything
    let name = req.name.as_deref().map(validate_project_name).transpose()?;

    let archived_at = req.archived.map(|archived| archived.then(Utc::now));
    projects::update_details(&state.db, project.id, name.as_deref(), archived_at).await?;

    info!(
        project_id = %project.id,
        renamed = name.is_some(),
        archived = ?req.archived,
        "Project updated"
    );

    let project = projects::get_project(&state.db, project.id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project {}", id)))?;
    Ok(Json(ProjectResponse { project }))
}

/// PATCH /api/projects/:id/status
///
/// Only `locked` can be requested, from `ready`. Locking twice is a no-op.
pub async fn set_status(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<SetStatusRequest>,
) -> ApiResult<Json<SetStatusResponse>> {
    let project = require_owned_project(&state.db, &id, &user).await?;

    if req.status.trim() != ProjectStatus::Locked.as_str() {
        return Err(ApiError::BadRequest(format!("Invalid status: {}", req.status)));
    }

    if project.status == ProjectStatus::Locked {
        return Ok(Json(SetStatusResponse {
            status: ProjectStatus::Locked,
            already: true,
        }));
    }

    if !project.status.can_transition_to(ProjectStatus::Locked) {
        return Err(ApiError::BadRequest(format!(
            "Project is {}, only ready projects can be locked",
            project.status
        )));
    }

    projects::update_status(&state.db, project.id, ProjectStatus::Locked).await?;
    info!(project_id = %project.id, "Project locked");

    Ok(Json(SetStatusResponse {
        status: ProjectStatus::Locked,
        already: false,
    }))
}

/// POST /api/projects/:id/notify
///
/// Signs a download URL for every uploaded file and relays the batch to the
/// automation. A rejected relay records an error event and fails the project.
pub async fn notify(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<NotifyRequest>,
) -> ApiResult<Json<OkResponse>> {
    let project = require_owned_project(&state.db, &id, &user).await?;

    if req.files.is_empty() {
        return Err(ApiError::BadRequest("Missing files".to_string()));
    }
    for file in &req.files {
        if file.bucket != state.config.storage_bucket {
            return Err(ApiError::Forbidden(format!("Bucket not allowed: {}", file.bucket)));
        }
        validate_object_path(&file.path)?;
    }

    let batch_id = req
        .batch_id
        .map(|b| b.trim().to_string())
        .filter(|b| !b.is_empty())
        .unwrap_or_else(|| project.batch_id.clone());

    let mut files = Vec::with_capacity(req.files.len());
    for file in req.files {
        let download_url = state
            .services
            .storage
            .sign_download(&file.bucket, &file.path, DOWNLOAD_URL_TTL_SECS)
            .await?;
        files.push(SignedFile {
            bucket: file.bucket,
            path: file.path,
            original_name: file.original_name,
            tag: file.tag,
            download_url,
        });
    }

    // A failed batch may be retried
    let mut status = project.status;
    if status == ProjectStatus::Failed {
        projects::update_status(&state.db, project.id, ProjectStatus::Processing).await?;
        status = ProjectStatus::Processing;
    }

    let count = files.len();
    let payload = BatchNotification {
        project_id: project.id,
        batch_id: batch_id.clone(),
        files,
    };

    if let Err(e) = state.services.relay.notify_batch(&payload).await {
        error!(project_id = %project.id, %batch_id, error = %e, "Batch notification failed");
        let message = format!("Échec de l'envoi à l'automatisation : {}", e);
        if let Err(db_err) = events::insert_event(
            &state.db,
            project.id,
            Some(&batch_id),
            None,
            EventKind::Error,
            &message,
        )
        .await
        {
            warn!(error = %db_err, "Could not record error event");
        }
        if status.can_transition_to(ProjectStatus::Failed) {
            projects::update_status(&state.db, project.id, ProjectStatus::Failed).await?;
        }
        return Err(e.into());
    }

    events::insert_event(
        &state.db,
        project.id,
        Some(&batch_id),
        None,
        EventKind::Info,
        &format!("{} fichier(s) transmis à l'automatisation", count),
    )
    .await?;
    info!(project_id = %project.id, %batch_id, files = count, "Batch relayed");

    Ok(Json(OkResponse::ok()))
}

pub fn project_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects", get(list_projects).post(create_project))
        .route("/api/projects/:id", get(get_project).patch(patch_project))
        .route("/api/projects/:id/status", patch(set_status))
        .route("/api/projects/:id/notify", post(notify))
}
