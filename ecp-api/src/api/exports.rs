//! Report exports: workbook, synthesis PDF and its HTML preview

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse, Response},
    routing::get,
    Extension, Router,
};
use ecp_common::models::ActivityCategory;
use serde::Deserialize;
use tracing::info;

use crate::api::auth::require_owned_project;
use crate::api::extract::ApiQuery;
use crate::db::results;
use crate::error::{ApiError, ApiResult};
use crate::report::{
    aggregate, build_workbook, pdf_filename, render_report, xlsx_filename, XLSX_CONTENT_TYPE,
};
use crate::services::User;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// Category label or slug; all rows when absent
    pub category: Option<String>,
}

fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        body,
    )
        .into_response()
}

/// GET /api/projects/:id/results.xlsx
pub async fn export_xlsx(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
    ApiQuery(query): ApiQuery<ExportQuery>,
) -> ApiResult<Response> {
    let project = require_owned_project(&state.db, &id, &user).await?;

    let category = query
        .category
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::parse::<ActivityCategory>)
        .transpose()?;

    let rows = results::fetch_all_rows(&state.db, project.id, category).await?;
    let bytes = build_workbook(&rows)
        .map_err(|e| ApiError::Internal(format!("Workbook generation failed: {}", e)))?;

    info!(
        project_id = %project.id,
        category = ?category.map(|c| c.label()),
        rows = rows.len(),
        "Workbook exported"
    );
    Ok(attachment(
        XLSX_CONTENT_TYPE,
        &xlsx_filename(project.id, category),
        bytes,
    ))
}

/// GET /api/projects/:id/results_synthese.pdf
pub async fn export_pdf(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let project = require_owned_project(&state.db, &id, &user).await?;

    let rows = results::fetch_all_rows(&state.db, project.id, None).await?;
    let html = render_report(&aggregate(&project.name, &rows));
    let pdf = state.services.pdf.render(html).await?;

    info!(project_id = %project.id, rows = rows.len(), bytes = pdf.len(), "Synthesis PDF exported");
    Ok(attachment("application/pdf", &pdf_filename(&project.name), pdf))
}

/// GET /api/projects/:id/results_synthese.html
pub async fn preview_html(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(id): Path<String>,
) -> ApiResult<Html<String>> {
    let project = require_owned_project(&state.db, &id, &user).await?;
    let rows = results::fetch_all_rows(&state.db, project.id, None).await?;
    Ok(Html(render_report(&aggregate(&project.name, &rows))))
}

pub fn export_routes() -> Router<AppState> {
    Router::new()
        .route("/api/projects/:id/results.xlsx", get(export_xlsx))
        .route("/api/projects/:id/results_synthese.pdf", get(export_pdf))
        .route("/api/projects/:id/results_synthese.html", get(preview_html))
}
