//! Index synchronization for the `courses_fts` full-text index.
//!
//! The index holds one FTS5 row per course, keyed by `rowid = course_id`,
//! mirroring `title, description, category, value_proposal, tutoria`.
//! Nothing but this module writes to it.
//!
//! The write functions take the connection of an open transaction: the
//! catalog repository calls them inside the same transaction that mutates
//! `courses`, and any failure here surfaces as
//! [`AppError::WriteConsistency`] so the caller drops the transaction and
//! the base-table change rolls back with it.

use catalogo_core::error::AppError;
use catalogo_core::models::IndexedFields;
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::{info, warn};

use crate::pool::begin_write;

/// Name of the FTS5 table.
pub const INDEX_TABLE: &str = "courses_fts";

/// DDL for the index. `unicode61` folds case and strips diacritics.
pub const CREATE_INDEX_SQL: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS courses_fts USING fts5(
    title,
    description,
    category,
    value_proposal,
    tutoria,
    tokenize = 'unicode61'
);
"#;

/// One stored index entry.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct IndexEntry {
    pub course_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub value_proposal: Option<String>,
    pub tutoria: Option<String>,
}

fn sync_error(action: &str, course_id: i64, err: sqlx::Error) -> AppError {
    warn!(course_id, error = %err, "index synchronization failed during {}", action);
    AppError::WriteConsistency(format!(
        "could not {} index entry for course {}: {}",
        action, course_id, err
    ))
}

/// Creates the index entry for a newly inserted course.
///
/// Fails if an entry for `course_id` already exists.
pub async fn insert_entry(
    conn: &mut SqliteConnection,
    course_id: i64,
    fields: &IndexedFields<'_>,
) -> Result<(), AppError> {
    sqlx::query(
        r#"
        INSERT INTO courses_fts (rowid, title, description, category, value_proposal, tutoria)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(course_id)
    .bind(fields.title)
    .bind(fields.description)
    .bind(fields.category)
    .bind(fields.value_proposal)
    .bind(fields.tutoria)
    .execute(&mut *conn)
    .await
    .map_err(|e| sync_error("insert", course_id, e))?;
    Ok(())
}

/// Replaces the entry of an updated course: delete, then reinsert.
///
/// Both statements run on the caller's transaction, so readers never see a
/// mix of old and new field values.
pub async fn replace_entry(
    conn: &mut SqliteConnection,
    course_id: i64,
    fields: &IndexedFields<'_>,
) -> Result<(), AppError> {
    remove_entry(&mut *conn, course_id).await?;
    insert_entry(&mut *conn, course_id, fields).await
}

/// Removes the entry of a deleted course. Returns whether an entry existed.
pub async fn remove_entry(conn: &mut SqliteConnection, course_id: i64) -> Result<bool, AppError> {
    let result = sqlx::query("DELETE FROM courses_fts WHERE rowid = ?")
        .bind(course_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| sync_error("remove", course_id, e))?;
    Ok(result.rows_affected() > 0)
}

/// Maps an error raised by a query against the index.
///
/// A missing or corrupt index becomes [`AppError::IndexUnavailable`], a
/// rejected match expression becomes [`AppError::QuerySyntax`], anything
/// else goes through the regular `sqlx::Error` conversion.
pub fn classify_query_error(err: sqlx::Error) -> AppError {
    let message = err.to_string();
    let lower = message.to_lowercase();
    if (lower.contains("no such table") && lower.contains(INDEX_TABLE))
        || lower.contains("malformed")
        || lower.contains("corrupt")
    {
        AppError::IndexUnavailable(message)
    } else if lower.contains("fts5: syntax error")
        || lower.contains("unterminated string")
        || lower.contains("unknown special query")
    {
        AppError::QuerySyntax(message)
    } else {
        AppError::from(err)
    }
}

/// Probes whether the index can serve queries.
///
/// `Ok(false)` means the index is missing or unreadable and searches should
/// use the fallback scan. An unreachable store is still an error.
pub async fn availability(pool: &SqlitePool) -> Result<bool, AppError> {
    let check = sqlx::query("SELECT rowid FROM courses_fts LIMIT 1")
        .fetch_optional(pool)
        .await;
    match check.map_err(classify_query_error) {
        Ok(_) => Ok(true),
        Err(AppError::IndexUnavailable(reason)) => {
            warn!(%reason, "search index unavailable");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Number of entries stored for one course. Always 0 or 1 when the index is
/// consistent.
pub async fn entry_count(pool: &SqlitePool, course_id: i64) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses_fts WHERE rowid = ?")
        .bind(course_id)
        .fetch_one(pool)
        .await
        .map_err(classify_query_error)?;
    Ok(count)
}

/// Total number of index entries.
pub async fn total_entries(pool: &SqlitePool) -> Result<i64, AppError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM courses_fts")
        .fetch_one(pool)
        .await
        .map_err(classify_query_error)?;
    Ok(count)
}

/// Reads back the entry of one course.
pub async fn get_entry(pool: &SqlitePool, course_id: i64) -> Result<Option<IndexEntry>, AppError> {
    let entry = sqlx::query_as::<_, IndexEntry>(
        r#"
        SELECT rowid AS course_id, title, description, category, value_proposal, tutoria
        FROM courses_fts
        WHERE rowid = ?
        "#,
    )
    .bind(course_id)
    .fetch_optional(pool)
    .await
    .map_err(classify_query_error)?;
    Ok(entry)
}

/// Drops and recreates the index from the `courses` table in one
/// transaction. Returns the number of entries written.
///
/// Recovers a missing or corrupted index. Readers keep seeing the old index
/// (or the fallback scan) until the transaction commits.
pub async fn rebuild(pool: &SqlitePool) -> Result<u64, AppError> {
    let mut tx = begin_write(pool).await?;
    sqlx::query("DROP TABLE IF EXISTS courses_fts")
        .execute(&mut *tx)
        .await?;
    sqlx::raw_sql(CREATE_INDEX_SQL).execute(&mut *tx).await?;
    let result = sqlx::query(
        r#"
        INSERT INTO courses_fts (rowid, title, description, category, value_proposal, tutoria)
        SELECT course_id, title, description, category, value_proposal, tutoria
        FROM courses
        "#,
    )
    .execute(&mut *tx)
    .await?;
    tx.commit().await?;

    info!(entries = result.rows_affected(), "search index rebuilt");
    Ok(result.rows_affected())
}
