//! Automation callbacks
//!
//! The automation narrates progress, reports failures, moves the project
//! status and delivers result rows. Every call carries the shared secret in
//! `x-n8n-token`. When a call omits the project or batch, they are taken
//! from the latest event recorded for its execution id.

use axum::{body::Bytes, extract::State, http::HeaderMap, routing::post, Json, Router};
use ecp_common::api::{
    secrets_match, AutomationEvent, AutomationResults, AutomationStatus, OkResponse,
};
use ecp_common::models::{EventKind, Project, ProjectStatus};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::extract::parse_body;
use crate::db::{events, projects, results};
use crate::error::{ApiError, ApiResult};
use crate::AppState;

pub const N8N_TOKEN_HEADER: &str = "x-n8n-token";

/// Message recorded when the automation reports an error without one
pub const UNKNOWN_ERROR_MESSAGE: &str = "Erreur inconnue (n8n)";

fn check_token(state: &AppState, headers: &HeaderMap) -> ApiResult<()> {
    let provided = headers
        .get(N8N_TOKEN_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if secrets_match(provided, &state.config.n8n_callback_secret) {
        Ok(())
    } else {
        warn!("Automation callback rejected");
        Err(ApiError::Unauthorized("Invalid callback token".to_string()))
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Resolve the project (and batch) a callback refers to
///
/// The batch falls back to the project's own batch when nothing else names one.
async fn resolve_target(
    state: &AppState,
    project_id: Option<String>,
    batch_id: Option<String>,
    execution_id: Option<&str>,
) -> ApiResult<(Project, String)> {
    let mut project_id = non_blank(project_id);
    let mut batch_id = non_blank(batch_id);

    if project_id.is_none() || batch_id.is_none() {
        if let Some(exec) = execution_id {
            if let Some((pid, bid)) = events::find_by_execution(&state.db, exec).await? {
                if project_id.is_none() {
                    project_id = Some(pid.to_string());
                }
                if batch_id.is_none() {
                    batch_id = bid;
                }
            }
        }
    }

    let raw = project_id.ok_or_else(|| {
        ApiError::BadRequest(
            "Cannot resolve project (provide projectId or a known executionId)".to_string(),
        )
    })?;
    let id = Uuid::parse_str(&raw).map_err(|_| ApiError::NotFound(format!("Project {}", raw)))?;
    let project = projects::get_project(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project {}", raw)))?;

    let batch_id = batch_id.unwrap_or_else(|| project.batch_id.clone());
    Ok((project, batch_id))
}

/// POST /api/n8n/progress
pub async fn progress(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<OkResponse>> {
    check_token(&state, &headers)?;
    let body: AutomationEvent = parse_body(&body)?;

    let execution_id = non_blank(body.execution_id);
    let message = non_blank(body.message)
        .ok_or_else(|| ApiError::BadRequest("Missing message".to_string()))?;
    let (project, batch_id) =
        resolve_target(&state, body.project_id, body.batch_id, execution_id.as_deref()).await?;

    events::insert_event(
        &state.db,
        project.id,
        Some(&batch_id),
        execution_id.as_deref(),
        EventKind::Progress,
        &message,
    )
    .await?;

    Ok(Json(OkResponse::ok()))
}

/// POST /api/n8n/error
///
/// Records an error event and fails the project.
pub async fn report_error(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<OkResponse>> {
    check_token(&state, &headers)?;
    let body: AutomationEvent = parse_body(&body)?;

    let execution_id = non_blank(body.execution_id);
    let message = non_blank(body.message).unwrap_or_else(|| UNKNOWN_ERROR_MESSAGE.to_string());
    let (project, batch_id) =
        resolve_target(&state, body.project_id, body.batch_id, execution_id.as_deref()).await?;

    events::insert_event(
        &state.db,
        project.id,
        Some(&batch_id),
        execution_id.as_deref(),
        EventKind::Error,
        &message,
    )
    .await?;

    if project.status.can_transition_to(ProjectStatus::Failed) {
        projects::update_status(&state.db, project.id, ProjectStatus::Failed).await?;
    } else {
        warn!(project_id = %project.id, status = %project.status, "Error reported on a locked project");
    }

    warn!(project_id = %project.id, %batch_id, %message, "Automation reported an error");
    Ok(Json(OkResponse::ok()))
}

#[derive(Debug, Serialize)]
pub struct StatusChange {
    pub ok: bool,
    pub previous: ProjectStatus,
    pub status: ProjectStatus,
}

/// POST /api/n8n/status
pub async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<StatusChange>> {
    check_token(&state, &headers)?;
    let body: AutomationStatus = parse_body(&body)?;

    let execution_id = non_blank(body.execution_id);
    let (project, _) = resolve_target(&state, body.project_id, None, execution_id.as_deref()).await?;

    if !project.status.can_transition_to(body.status) {
        return Err(ApiError::BadRequest(format!(
            "Invalid transition {} -> {}",
            project.status, body.status
        )));
    }

    if project.status != body.status {
        projects::update_status(&state.db, project.id, body.status).await?;
        info!(
            project_id = %project.id,
            from = %project.status,
            to = %body.status,
            "Project status changed"
        );
    }

    Ok(Json(StatusChange {
        ok: true,
        previous: project.status,
        status: body.status,
    }))
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub ok: bool,
    pub inserted: u64,
}

/// POST /api/n8n/results
///
/// Rows with unknown fields are rejected before anything is written.
pub async fn ingest_results(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<IngestResponse>> {
    check_token(&state, &headers)?;
    let body: AutomationResults = parse_body(&body)?;

    let execution_id = non_blank(body.execution_id);
    let (project, batch_id) =
        resolve_target(&state, body.project_id, body.batch_id, execution_id.as_deref()).await?;

    let inserted = results::insert_rows(&state.db, project.id, Some(&batch_id), &body.rows).await?;
    info!(project_id = %project.id, %batch_id, inserted, "Result rows ingested");

    Ok(Json(IngestResponse { ok: true, inserted }))
}

pub fn n8n_routes() -> Router<AppState> {
    Router::new()
        .route("/api/n8n/progress", post(progress))
        .route("/api/n8n/error", post(report_error))
        .route("/api/n8n/status", post(update_status))
        .route("/api/n8n/results", post(ingest_results))
}
