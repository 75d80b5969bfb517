//! Project registry persistence

use chrono::{DateTime, Utc};
use ecp_common::models::{Project, ProjectStatus};
use ecp_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};

const PROJECT_COLUMNS: &str =
    "id, owner_id, name, status, batch_id, created_by_email, created_at, archived_at";

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;
    let archived_at: Option<String> = row.try_get("archived_at")?;

    Ok(Project {
        id: parse_uuid(&id)?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        status: status.parse()?,
        batch_id: row.try_get("batch_id")?,
        created_at: parse_timestamp(&created_at)?,
        archived_at: archived_at.as_deref().map(parse_timestamp).transpose()?,
        created_by_email: row.try_get("created_by_email")?,
    })
}

pub async fn insert_project(pool: &SqlitePool, project: &Project) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO projects (id, owner_id, name, status, batch_id, created_by_email, created_at, archived_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project.id.to_string())
    .bind(&project.owner_id)
    .bind(&project.name)
    .bind(project.status.as_str())
    .bind(&project.batch_id)
    .bind(&project.created_by_email)
    .bind(format_timestamp(project.created_at))
    .bind(project.archived_at.map(format_timestamp))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_project(pool: &SqlitePool, id: Uuid) -> Result<Option<Project>> {
    let sql = format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS);
    let row = sqlx::query(&sql)
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(project_from_row).transpose()
}

/// Owner's projects, newest first
pub async fn list_projects(
    pool: &SqlitePool,
    owner_id: &str,
    include_archived: bool,
) -> Result<Vec<Project>> {
    let sql = format!(
        "SELECT {} FROM projects WHERE owner_id = ? {} ORDER BY created_at DESC, rowid DESC",
        PROJECT_COLUMNS,
        if include_archived { "" } else { "AND archived_at IS NULL" }
    );
    let rows = sqlx::query(&sql).bind(owner_id).fetch_all(pool).await?;

    rows.iter().map(project_from_row).collect()
}

/// Rename and/or set the archival timestamp in one statement
///
/// `archived_at` of `None` leaves archival untouched; `Some(None)` restores.
pub async fn update_details(
    pool: &SqlitePool,
    id: Uuid,
    name: Option<&str>,
    archived_at: Option<Option<DateTime<Utc>>>,
) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE projects SET
            name = COALESCE(?, name),
            archived_at = CASE WHEN ? THEN ? ELSE archived_at END
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(archived_at.is_some())
    .bind(archived_at.flatten().map(format_timestamp))
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_status(pool: &SqlitePool, id: Uuid, status: ProjectStatus) -> Result<()> {
    sqlx::query("UPDATE projects SET status = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
