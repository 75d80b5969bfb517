//! Request and response bodies of the HTTP API
//!
//! Envelopes use camelCase keys; embedded models keep their own snake_case fields.

use serde::{Deserialize, Serialize};

use crate::models::{
    ActivityCategory, NewResultRow, Project, ProjectEvent, ProjectStatus, ReprocessStatus,
    ResultRow, VerificationStatus,
};

// ========================================
// Storage signing
// ========================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUploadRequest {
    pub filename: String,
    pub batch_id: Option<String>,
    pub tag: Option<String>,
    pub project_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUploadResponse {
    pub bucket: String,
    pub path: String,
    pub signed_url: String,
    pub token: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignDownloadRequest {
    pub bucket: Option<String>,
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignDownloadResponse {
    pub bucket: String,
    pub path: String,
    pub signed_url: String,
    pub expires_in: u64,
}

// ========================================
// Projects
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectResponse {
    pub project_id: String,
    pub batch_id: String,
    pub project_name: String,
}

/// At least one field must be present
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatchProjectRequest {
    pub name: Option<String>,
    pub archived: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusRequest {
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetStatusResponse {
    pub status: ProjectStatus,
    /// True when the project already had the requested status
    pub already: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectListResponse {
    pub projects: Vec<Project>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectResponse {
    pub project: Project,
}

/// Files already uploaded for a batch, to be handed to the automation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyRequest {
    pub batch_id: Option<String>,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub bucket: String,
    pub path: String,
    pub original_name: Option<String>,
    pub tag: Option<String>,
}

// ========================================
// Result rows
// ========================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultsPage {
    pub rows: Vec<ResultRow>,
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
    pub total_pages: i64,
}

/// Review snapshot: the project plus every row, verification-required first
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSnapshot {
    pub project: Project,
    pub rows: Vec<ResultRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationRequest {
    pub ids: Vec<i64>,
    #[serde(default = "default_validated")]
    pub status: VerificationStatus,
}

fn default_validated() -> VerificationStatus {
    VerificationStatus::Validated
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdatedResponse {
    pub updated: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsResponse {
    pub events: Vec<ProjectEvent>,
}

// ========================================
// Reprocessing
// ========================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReprocessItem {
    pub id: i64,
    pub category: ActivityCategory,
    #[serde(default)]
    pub hint: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprocessRequest {
    pub items: Vec<ReprocessItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprocessResponse {
    pub queued: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReprocessCallback {
    pub ids: Vec<i64>,
    #[serde(default = "default_done")]
    pub status: ReprocessStatus,
    /// Recomputed values for some of the rows
    #[serde(default)]
    pub updates: Vec<RowUpdate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowUpdate {
    pub id: i64,
    pub values: NewResultRow,
}

fn default_done() -> ReprocessStatus {
    ReprocessStatus::Done
}

// ========================================
// Automation callbacks
// ========================================

/// Progress or error narration from the automation
///
/// Missing project/batch ids are resolved from `execution_id`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationEvent {
    pub project_id: Option<String>,
    pub batch_id: Option<String>,
    pub execution_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationStatus {
    pub project_id: Option<String>,
    pub execution_id: Option<String>,
    pub status: ProjectStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationResults {
    pub project_id: Option<String>,
    pub batch_id: Option<String>,
    pub execution_id: Option<String>,
    pub rows: Vec<NewResultRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

// ========================================
// Errors
// ========================================

/// `{"error": {"code", "message"}}` body returned on failures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}
