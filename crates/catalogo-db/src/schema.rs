//! SQLite schema for the catalog, its search index and the vocabulary.

use catalogo_core::error::AppError;
use sqlx::SqlitePool;

use crate::index::CREATE_INDEX_SQL;

/// Base tables. `AUTOINCREMENT` keeps course ids from being reused after a
/// delete, so a stale index rowid can never point at a different course.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS courses (
    course_id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    category TEXT,
    modality TEXT,
    duration TEXT,
    price TEXT,
    start_date TEXT,
    location TEXT,
    value_proposal TEXT,
    tutoria TEXT,
    description TEXT,
    raw_html TEXT,
    last_crawled_at TEXT NOT NULL,
    content_hash TEXT
);

CREATE TABLE IF NOT EXISTS terms (
    term_id INTEGER PRIMARY KEY AUTOINCREMENT,
    term TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS synonyms (
    synonym_id INTEGER PRIMARY KEY AUTOINCREMENT,
    term_id INTEGER NOT NULL REFERENCES terms(term_id) ON DELETE CASCADE,
    synonym TEXT NOT NULL,
    UNIQUE (term_id, synonym)
);

CREATE INDEX IF NOT EXISTS idx_synonyms_term ON synonyms(term_id);
"#;

/// Creates every table and the search index if they do not exist yet.
pub async fn init_schema(pool: &SqlitePool) -> Result<(), AppError> {
    sqlx::raw_sql(SCHEMA_SQL).execute(pool).await?;
    sqlx::raw_sql(CREATE_INDEX_SQL).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_pool;

    #[tokio::test]
    async fn test_init_schema_is_idempotent() {
        let pool = test_pool().await;
        init_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('courses', 'courses_fts', 'terms', 'synonyms') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();
        let names: Vec<String> = tables.into_iter().map(|(name,)| name).collect();
        assert_eq!(names, vec!["courses", "courses_fts", "synonyms", "terms"]);
    }
}
