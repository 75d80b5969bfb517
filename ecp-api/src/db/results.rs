//! Result row persistence
//!
//! Rows are created in bulk by the automation and never deleted; only the
//! verification and reprocessing status columns change afterwards.

use ecp_common::api::RowUpdate;
use ecp_common::models::{
    ActivityCategory, NewResultRow, ReprocessStatus, ResultRow, VerificationStatus,
};
use ecp_common::{Error, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, QueryBuilder, Row, Sqlite, SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

/// Page size used when exporters walk every row
pub const EXPORT_PAGE_SIZE: i64 = 1000;

const RESULT_COLUMNS: &str = "id, project_id, batch_id, category, activity, supplier, \
     total_price_eur, quantity, quantity_unit, emission_factor, factor_unit, factor_source, \
     factor_database, total_emission, emission_unit, factor_found, requires_verification, \
     verification_status, reprocess_status, comment";

fn result_from_row(row: &SqliteRow) -> Result<ResultRow> {
    let project_id: String = row.try_get("project_id")?;
    let category: Option<String> = row.try_get("category")?;
    let verification: String = row.try_get("verification_status")?;
    let reprocess: String = row.try_get("reprocess_status")?;

    Ok(ResultRow {
        id: row.try_get("id")?,
        project_id: parse_uuid(&project_id)?,
        batch_id: row.try_get("batch_id")?,
        // Unknown labels from older automation runs are kept as uncategorized
        category: category.and_then(|c| c.parse::<ActivityCategory>().ok()),
        activity: row.try_get("activity")?,
        supplier: row.try_get("supplier")?,
        total_price_eur: row.try_get("total_price_eur")?,
        quantity: row.try_get("quantity")?,
        quantity_unit: row.try_get("quantity_unit")?,
        emission_factor: row.try_get("emission_factor")?,
        factor_unit: row.try_get("factor_unit")?,
        factor_source: row.try_get("factor_source")?,
        factor_database: row.try_get("factor_database")?,
        total_emission: row.try_get("total_emission")?,
        emission_unit: row.try_get("emission_unit")?,
        factor_found: row.try_get("factor_found")?,
        requires_verification: row.try_get("requires_verification")?,
        verification_status: verification.parse::<VerificationStatus>()?,
        reprocess_status: reprocess.parse::<ReprocessStatus>()?,
        comment: row.try_get("comment")?,
    })
}

/// Insert rows produced by one automation run, all or nothing
pub async fn insert_rows(
    pool: &SqlitePool,
    project_id: Uuid,
    batch_id: Option<&str>,
    rows: &[NewResultRow],
) -> Result<u64> {
    let mut tx = pool.begin().await?;

    for row in rows {
        sqlx::query(
            r#"
            INSERT INTO results (
                project_id, batch_id, category, activity, supplier,
                total_price_eur, quantity, quantity_unit, emission_factor, factor_unit,
                factor_source, factor_database, total_emission, emission_unit,
                factor_found, requires_verification, comment
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(project_id.to_string())
        .bind(batch_id)
        .bind(row.category.map(|c| c.label()))
        .bind(&row.activity)
        .bind(&row.supplier)
        .bind(row.total_price_eur)
        .bind(row.quantity)
        .bind(&row.quantity_unit)
        .bind(row.emission_factor)
        .bind(&row.factor_unit)
        .bind(&row.factor_source)
        .bind(&row.factor_database)
        .bind(row.total_emission)
        .bind(&row.emission_unit)
        .bind(row.factor_found)
        .bind(row.requires_verification)
        .bind(&row.comment)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(rows.len() as u64)
}

pub async fn count_rows(pool: &SqlitePool, project_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM results WHERE project_id = ?")
        .bind(project_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// One page of rows in id order
pub async fn page_rows(
    pool: &SqlitePool,
    project_id: Uuid,
    limit: i64,
    offset: i64,
) -> Result<Vec<ResultRow>> {
    let sql = format!(
        "SELECT {} FROM results WHERE project_id = ? ORDER BY id ASC LIMIT ? OFFSET ?",
        RESULT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(project_id.to_string())
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    rows.iter().map(result_from_row).collect()
}

/// Keyset page: rows with `id > after_id`, optionally restricted to a category
pub async fn rows_after(
    pool: &SqlitePool,
    project_id: Uuid,
    category: Option<ActivityCategory>,
    after_id: i64,
    limit: i64,
) -> Result<Vec<ResultRow>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT ");
    qb.push(RESULT_COLUMNS)
        .push(" FROM results WHERE project_id = ")
        .push_bind(project_id.to_string())
        .push(" AND id > ")
        .push_bind(after_id);
    if let Some(category) = category {
        qb.push(" AND category = ").push_bind(category.label());
    }
    qb.push(" ORDER BY id ASC LIMIT ").push_bind(limit);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(result_from_row).collect()
}

/// Every row of a project, walked in pages until a short page
pub async fn fetch_all_rows(
    pool: &SqlitePool,
    project_id: Uuid,
    category: Option<ActivityCategory>,
) -> Result<Vec<ResultRow>> {
    let mut all = Vec::new();
    let mut after_id = 0;

    loop {
        let page = rows_after(pool, project_id, category, after_id, EXPORT_PAGE_SIZE).await?;
        let short = (page.len() as i64) < EXPORT_PAGE_SIZE;
        if let Some(last) = page.last() {
            after_id = last.id;
        }
        all.extend(page);
        if short {
            break;
        }
    }

    Ok(all)
}

/// Review ordering: verification-required rows first, then by id
pub async fn review_rows(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<ResultRow>> {
    let sql = format!(
        "SELECT {} FROM results WHERE project_id = ? ORDER BY requires_verification DESC, id ASC",
        RESULT_COLUMNS
    );
    let rows = sqlx::query(&sql)
        .bind(project_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(result_from_row).collect()
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    qb.push(" AND id IN (");
    let mut separated = qb.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");
}

/// Deduplicated ids, or an error if any of them is not a row of the project
async fn require_owned_rows(
    conn: &mut SqliteConnection,
    project_id: Uuid,
    ids: &[i64],
) -> Result<Vec<i64>> {
    let mut distinct = ids.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.is_empty() {
        return Ok(distinct);
    }

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT COUNT(DISTINCT id) FROM results WHERE project_id = ");
    qb.push_bind(project_id.to_string());
    push_id_list(&mut qb, &distinct);
    let owned: i64 = qb.build_query_scalar().fetch_one(&mut *conn).await?;

    if owned != distinct.len() as i64 {
        return Err(Error::InvalidInput(
            "Some rows do not belong to this project".to_string(),
        ));
    }
    Ok(distinct)
}

/// Set verification status on rows that require verification
///
/// Rows that do not require verification are always considered validated,
/// so they are left untouched.
pub async fn set_verification(
    pool: &SqlitePool,
    project_id: Uuid,
    ids: &[i64],
    status: VerificationStatus,
) -> Result<u64> {
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE results SET verification_status = ");
    qb.push_bind(status.as_str())
        .push(", updated_at = CURRENT_TIMESTAMP WHERE project_id = ")
        .push_bind(project_id.to_string())
        .push(" AND requires_verification = 1");
    push_id_list(&mut qb, ids);

    let result = qb.build().execute(pool).await?;
    Ok(result.rows_affected())
}

/// Mark rows as being reprocessed, atomically
///
/// Fails without touching anything if any id does not belong to the project.
pub async fn mark_reprocessing(pool: &SqlitePool, project_id: Uuid, ids: &[i64]) -> Result<u64> {
    let mut tx = pool.begin().await?;
    let distinct = require_owned_rows(&mut *tx, project_id, ids).await?;
    let updated =
        write_reprocess_status(&mut *tx, project_id, &distinct, ReprocessStatus::Processing)
            .await?;

    tx.commit().await?;
    Ok(updated)
}

pub async fn set_reprocess_status(
    pool: &SqlitePool,
    project_id: Uuid,
    ids: &[i64],
    status: ReprocessStatus,
) -> Result<u64> {
    write_reprocess_status(pool, project_id, ids, status).await
}

async fn write_reprocess_status<'e, E>(
    executor: E,
    project_id: Uuid,
    ids: &[i64],
    status: ReprocessStatus,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    if ids.is_empty() {
        return Ok(0);
    }

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE results SET reprocess_status = ");
    qb.push_bind(status.as_str())
        .push(", updated_at = CURRENT_TIMESTAMP WHERE project_id = ")
        .push_bind(project_id.to_string());
    push_id_list(&mut qb, ids);

    let result = qb.build().execute(executor).await?;
    Ok(result.rows_affected())
}

/// Overwrite the computed values of one row with a recomputation
async fn update_row_values<'e, E>(
    executor: E,
    project_id: Uuid,
    id: i64,
    values: &NewResultRow,
) -> Result<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        r#"
        UPDATE results SET
            category = ?, activity = ?, supplier = ?, total_price_eur = ?,
            quantity = ?, quantity_unit = ?, emission_factor = ?, factor_unit = ?,
            factor_source = ?, factor_database = ?, total_emission = ?, emission_unit = ?,
            factor_found = ?, requires_verification = ?, comment = ?,
            updated_at = CURRENT_TIMESTAMP
        WHERE project_id = ? AND id = ?
        "#,
    )
    .bind(values.category.map(|c| c.label()))
    .bind(&values.activity)
    .bind(&values.supplier)
    .bind(values.total_price_eur)
    .bind(values.quantity)
    .bind(&values.quantity_unit)
    .bind(values.emission_factor)
    .bind(&values.factor_unit)
    .bind(&values.factor_source)
    .bind(&values.factor_database)
    .bind(values.total_emission)
    .bind(&values.emission_unit)
    .bind(values.factor_found)
    .bind(values.requires_verification)
    .bind(&values.comment)
    .bind(project_id.to_string())
    .bind(id)
    .execute(executor)
    .await?;

    Ok(result.rows_affected())
}

/// Apply a reprocess report: recomputed values, then the status of every listed row
///
/// All-or-nothing. Every id must belong to the project and every update
/// must name one of `ids`.
pub async fn apply_reprocess_report(
    pool: &SqlitePool,
    project_id: Uuid,
    ids: &[i64],
    updates: &[RowUpdate],
    status: ReprocessStatus,
) -> Result<u64> {
    if let Some(stray) = updates.iter().find(|u| !ids.contains(&u.id)) {
        return Err(Error::InvalidInput(format!(
            "Update for row {} which is not listed in ids",
            stray.id
        )));
    }

    let mut tx = pool.begin().await?;
    let distinct = require_owned_rows(&mut *tx, project_id, ids).await?;

    for update in updates {
        update_row_values(&mut *tx, project_id, update.id, &update.values).await?;
    }
    let updated = write_reprocess_status(&mut *tx, project_id, &distinct, status).await?;

    tx.commit().await?;
    Ok(updated)
}
