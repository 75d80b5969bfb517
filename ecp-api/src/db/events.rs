//! Project event log (append-only)

use chrono::Utc;
use ecp_common::models::{EventKind, ProjectEvent};
use ecp_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, parse_uuid};

/// Default and maximum number of events returned to pollers
pub const DEFAULT_EVENT_LIMIT: i64 = 15;
pub const MAX_EVENT_LIMIT: i64 = 50;

fn event_from_row(row: &SqliteRow) -> Result<ProjectEvent> {
    let project_id: String = row.try_get("project_id")?;
    let kind: String = row.try_get("kind")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(ProjectEvent {
        id: row.try_get("id")?,
        project_id: parse_uuid(&project_id)?,
        batch_id: row.try_get("batch_id")?,
        execution_id: row.try_get("execution_id")?,
        kind: kind.parse()?,
        message: row.try_get("message")?,
        created_at: parse_timestamp(&created_at)?,
    })
}

pub async fn insert_event(
    pool: &SqlitePool,
    project_id: Uuid,
    batch_id: Option<&str>,
    execution_id: Option<&str>,
    kind: EventKind,
    message: &str,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO project_events (project_id, batch_id, execution_id, kind, message, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project_id.to_string())
    .bind(batch_id)
    .bind(execution_id)
    .bind(kind.as_str())
    .bind(message)
    .bind(format_timestamp(Utc::now()))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Most recent `limit` events, returned oldest first
pub async fn recent_events(pool: &SqlitePool, project_id: Uuid, limit: i64) -> Result<Vec<ProjectEvent>> {
    let rows = sqlx::query(
        r#"
        SELECT id, project_id, batch_id, execution_id, kind, message, created_at
        FROM project_events
        WHERE project_id = ?
        ORDER BY id DESC
        LIMIT ?
        "#,
    )
    .bind(project_id.to_string())
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let mut events = rows.iter().map(event_from_row).collect::<Result<Vec<_>>>()?;
    events.reverse();
    Ok(events)
}

/// Project and batch of the latest event recorded for an execution
pub async fn find_by_execution(
    pool: &SqlitePool,
    execution_id: &str,
) -> Result<Option<(Uuid, Option<String>)>> {
    let row = sqlx::query(
        r#"
        SELECT project_id, batch_id FROM project_events
        WHERE execution_id = ?
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(execution_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let project_id: String = row.try_get("project_id")?;
            Ok(Some((parse_uuid(&project_id)?, row.try_get("batch_id")?)))
        }
        None => Ok(None),
    }
}

/// Clamp a requested limit to `1..=MAX_EVENT_LIMIT`, defaulting when absent
pub fn clamp_limit(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .clamp(1, MAX_EVENT_LIMIT)
}
