//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the schema
//! idempotently. Safe to call on every startup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

/// Current schema version recorded in `schema_version`
pub const SCHEMA_VERSION: i64 = 1;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL lets the review pollers read while the automation callbacks write
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    configure_and_create(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Single connection that is never recycled, since every SQLite in-memory
/// connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    configure_and_create(&pool).await?;

    Ok(pool)
}

async fn configure_and_create(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    create_schema_version_table(pool).await?;
    create_projects_table(pool).await?;
    create_results_table(pool).await?;
    create_project_events_table(pool).await?;

    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(SCHEMA_VERSION)
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the projects table
///
/// Projects are never hard-deleted; `archived_at` marks soft deletion.
pub async fn create_projects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            owner_id TEXT NOT NULL,
            name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'processing'
                CHECK (status IN ('processing', 'ready', 'locked', 'failed')),
            batch_id TEXT NOT NULL,
            created_by_email TEXT,
            created_at TEXT NOT NULL,
            archived_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_projects_owner ON projects(owner_id, created_at)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the results table (one row per computed line item)
pub async fn create_results_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL REFERENCES projects(id),
            batch_id TEXT,
            category TEXT,
            activity TEXT,
            supplier TEXT,
            total_price_eur REAL,
            quantity REAL,
            quantity_unit TEXT,
            emission_factor REAL,
            factor_unit TEXT,
            factor_source TEXT,
            factor_database TEXT,
            total_emission REAL,
            emission_unit TEXT,
            factor_found INTEGER NOT NULL DEFAULT 0,
            requires_verification INTEGER NOT NULL DEFAULT 0,
            verification_status TEXT NOT NULL DEFAULT 'unverified'
                CHECK (verification_status IN ('unverified', 'validated')),
            reprocess_status TEXT NOT NULL DEFAULT 'empty'
                CHECK (reprocess_status IN ('empty', 'processing', 'done', 'failed')),
            comment TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_results_project ON results(project_id, id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the project events table (append-only)
pub async fn create_project_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS project_events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL REFERENCES projects(id),
            batch_id TEXT,
            execution_id TEXT,
            kind TEXT NOT NULL CHECK (kind IN ('progress', 'error', 'info')),
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_events_project ON project_events(project_id, id)",
    )
    .execute(pool)
    .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_events_execution ON project_events(execution_id, id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
