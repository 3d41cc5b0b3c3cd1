//! Course repository: the catalog store and its transactional write path.
//!
//! Every write that touches `courses` synchronizes the search index inside
//! the same transaction (see [`crate::index`]). If either side fails the
//! transaction is dropped uncommitted and nothing becomes visible.

use catalogo_core::error::AppError;
use catalogo_core::models::{normalize_course_url, CatalogStats, Course, NewCourse, UpsertOutcome};
use catalogo_core::sync::needs_reprocessing;
use sqlx::{SqlitePool, Sqlite, Pool};
use tracing::{info, warn};

use crate::index;
use crate::pool::begin_write;

/// Column list for SELECT queries. Must remain a const literal to ensure SQL safety
/// since format!() bypasses sqlx compile-time validation.
pub(crate) const COURSE_COLUMNS: &str = "course_id, url, title, category, modality, duration, price, start_date, location, value_proposal, tutoria, description, raw_html, last_crawled_at, content_hash";

/// Repository for course persistence in SQLite.
///
/// # Examples
///
/// ```no_run
/// use catalogo_core::config::DbConfig;
/// use catalogo_core::models::NewCourse;
/// use catalogo_db::{connect, init_schema, CourseRepository};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = connect("sqlite:data/cursos.sqlite", &DbConfig::default()).await?;
/// init_schema(&pool).await?;
///
/// let repo = CourseRepository::new(pool);
/// let outcome = repo
///     .upsert(&NewCourse::new("https://example.edu/curso/ia", "Fundamentos de IA"))
///     .await?;
/// println!("stored as course {}", outcome.course_id);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CourseRepository {
    pool: Pool<Sqlite>,
}

impl CourseRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Inserts a course or updates the row with the same URL, keeping the
    /// search index in step.
    ///
    /// - new URL: insert the row and create its index entry
    /// - content changed: overwrite every attribute and replace the entry
    /// - content unchanged: refresh `last_crawled_at` only
    ///
    /// # Errors
    ///
    /// `InvalidCourse`/`InvalidUrl` for bad input, `WriteConsistency` if the
    /// index could not be updated (the row change is rolled back too),
    /// `StoreUnavailable` if the database cannot be reached.
    pub async fn upsert(&self, new_course: &NewCourse) -> Result<UpsertOutcome, AppError> {
        let course = new_course.validated()?;
        let content_hash = course.content_hash();

        let mut tx = begin_write(&self.pool).await?;

        let existing: Option<(i64, Option<String>)> =
            sqlx::query_as("SELECT course_id, content_hash FROM courses WHERE url = ?")
                .bind(&course.url)
                .fetch_optional(&mut *tx)
                .await?;

        let decision = needs_reprocessing(existing.as_ref().map(|(_, hash)| hash), &content_hash);

        let course_id = match existing {
            Some((course_id, _)) if !decision.needs_rewrite => {
                sqlx::query("UPDATE courses SET last_crawled_at = ? WHERE course_id = ?")
                    .bind(course.last_crawled_at)
                    .bind(course_id)
                    .execute(&mut *tx)
                    .await?;
                course_id
            }
            Some((course_id, _)) => {
                sqlx::query(
                    r#"
                    UPDATE courses SET
                        title = ?,
                        category = ?,
                        modality = ?,
                        duration = ?,
                        price = ?,
                        start_date = ?,
                        location = ?,
                        value_proposal = ?,
                        tutoria = ?,
                        description = ?,
                        raw_html = ?,
                        last_crawled_at = ?,
                        content_hash = ?
                    WHERE course_id = ?
                    "#,
                )
                .bind(&course.title)
                .bind(&course.category)
                .bind(&course.modality)
                .bind(&course.duration)
                .bind(&course.price)
                .bind(&course.start_date)
                .bind(&course.location)
                .bind(&course.value_proposal)
                .bind(&course.tutoria)
                .bind(&course.description)
                .bind(&course.raw_html)
                .bind(course.last_crawled_at)
                .bind(&content_hash)
                .bind(course_id)
                .execute(&mut *tx)
                .await?;

                index::replace_entry(&mut *tx, course_id, &course.indexed_fields()).await?;
                course_id
            }
            None => {
                let (course_id,): (i64,) = sqlx::query_as(
                    r#"
                    INSERT INTO courses (
                        url,
                        title,
                        category,
                        modality,
                        duration,
                        price,
                        start_date,
                        location,
                        value_proposal,
                        tutoria,
                        description,
                        raw_html,
                        last_crawled_at,
                        content_hash
                    )
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    RETURNING course_id
                    "#,
                )
                .bind(&course.url)
                .bind(&course.title)
                .bind(&course.category)
                .bind(&course.modality)
                .bind(&course.duration)
                .bind(&course.price)
                .bind(&course.start_date)
                .bind(&course.location)
                .bind(&course.value_proposal)
                .bind(&course.tutoria)
                .bind(&course.description)
                .bind(&course.raw_html)
                .bind(course.last_crawled_at)
                .bind(&content_hash)
                .fetch_one(&mut *tx)
                .await?;

                index::insert_entry(&mut *tx, course_id, &course.indexed_fields()).await?;
                course_id
            }
        };

        tx.commit().await?;

        info!(
            course_id,
            url = %course.url,
            outcome = ?decision.outcome,
            reason = decision.reason,
            "course upserted"
        );
        Ok(UpsertOutcome {
            course_id,
            outcome: decision.outcome,
        })
    }

    /// Deletes a course and its index entry. Returns true if the course existed.
    ///
    /// Deletion is an explicit administrative action; a course missing from
    /// a later crawl is never removed implicitly.
    pub async fn delete(&self, course_id: i64) -> Result<bool, AppError> {
        let mut tx = begin_write(&self.pool).await?;

        let had_entry = index::remove_entry(&mut *tx, course_id).await?;
        let result = sqlx::query("DELETE FROM courses WHERE course_id = ?")
            .bind(course_id)
            .execute(&mut *tx)
            .await?;
        let deleted = result.rows_affected() > 0;

        if had_entry && !deleted {
            warn!(course_id, "removed an index entry without a matching course");
        }

        tx.commit().await?;

        if deleted {
            info!(course_id, "course deleted");
        }
        Ok(deleted)
    }

    /// Retrieves a course by id.
    pub async fn get(&self, course_id: i64) -> Result<Option<Course>, AppError> {
        let query = format!("SELECT {} FROM courses WHERE course_id = ?", COURSE_COLUMNS);
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(course_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    /// Retrieves a course by URL. The URL is normalized the same way as on upsert.
    pub async fn get_by_url(&self, url: &str) -> Result<Option<Course>, AppError> {
        let url = normalize_course_url(url)?;
        let query = format!("SELECT {} FROM courses WHERE url = ?", COURSE_COLUMNS);
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    /// Returns the lowest-id course whose title contains `fragment`
    /// (ASCII case-insensitive).
    pub async fn find_first_by_title(&self, fragment: &str) -> Result<Option<Course>, AppError> {
        let query = format!(
            "SELECT {} FROM courses WHERE title LIKE ? ESCAPE '\\' ORDER BY course_id LIMIT 1",
            COURSE_COLUMNS
        );
        let course = sqlx::query_as::<_, Course>(&query)
            .bind(format!("%{}%", escape_like(fragment)))
            .fetch_optional(&self.pool)
            .await?;
        Ok(course)
    }

    /// Lists courses ordered by id, with an optional limit.
    pub async fn list_all(&self, limit: Option<usize>) -> Result<Vec<Course>, AppError> {
        let limit_val = limit.map(|l| l as i64).unwrap_or(-1);
        let query = format!(
            "SELECT {} FROM courses ORDER BY course_id LIMIT ?",
            COURSE_COLUMNS
        );
        let courses = sqlx::query_as::<_, Course>(&query)
            .bind(limit_val)
            .fetch_all(&self.pool)
            .await?;
        Ok(courses)
    }

    /// Returns aggregated catalog statistics.
    ///
    /// `indexed_entries` is `None` when the search index is unavailable.
    pub async fn get_stats(&self) -> Result<CatalogStats, AppError> {
        let row: StatsRow = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM courses) AS total_courses,
                (SELECT COUNT(*) FROM terms) AS total_terms,
                (SELECT COUNT(*) FROM synonyms) AS total_synonyms,
                (SELECT MAX(last_crawled_at) FROM courses) AS last_crawl
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        let indexed_entries = match index::total_entries(&self.pool).await {
            Ok(count) => Some(count),
            Err(AppError::IndexUnavailable(_)) => None,
            Err(e) => return Err(e),
        };

        Ok(CatalogStats {
            total_courses: row.total_courses,
            indexed_entries,
            total_terms: row.total_terms,
            total_synonyms: row.total_synonyms,
            last_crawl: row
                .last_crawl
                .and_then(|raw| raw.parse::<chrono::DateTime<chrono::Utc>>().ok()),
        })
    }
}

/// Escapes `%`, `_` and `\` for a LIKE pattern using `\` as escape character.
fn escape_like(fragment: &str) -> String {
    let mut escaped = String::with_capacity(fragment.len());
    for c in fragment.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Helper struct for deserializing stats query results
#[derive(sqlx::FromRow)]
struct StatsRow {
    total_courses: i64,
    total_terms: i64,
    total_synonyms: i64,
    last_crawl: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index;
    use crate::testing::{course, test_pool};
    use catalogo_core::sync::SyncOutcome;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn test_upsert_creates_course_and_index_entry() {
        let repo = CourseRepository::new(test_pool().await);
        let new_course = course("https://example.edu/curso/ia", "Fundamentos de IA");

        let outcome = repo.upsert(&new_course).await.unwrap();
        assert_eq!(outcome.outcome, SyncOutcome::Created);

        let stored = repo.get(outcome.course_id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Fundamentos de IA");
        assert_eq!(stored.content_hash.as_deref(), Some(new_course.content_hash().as_str()));

        let entry = index::get_entry(repo.pool(), outcome.course_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.title, stored.title);
        assert_eq!(entry.description, stored.description);
        assert_eq!(entry.category, stored.category);
        assert_eq!(entry.value_proposal, stored.value_proposal);
        assert_eq!(entry.tutoria, stored.tutoria);
    }

    #[tokio::test]
    async fn test_upsert_same_url_updates_in_place() {
        let repo = CourseRepository::new(test_pool().await);
        let first = course("https://example.edu/curso/ia", "Fundamentos de IA");
        let created = repo.upsert(&first).await.unwrap();

        let mut second = first.clone();
        second.title = "Fundamentos de IA (2da edición)".to_string();
        second.tutoria = Some("Con tutor".to_string());
        second.last_crawled_at = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let updated = repo.upsert(&second).await.unwrap();

        assert_eq!(updated.course_id, created.course_id);
        assert_eq!(updated.outcome, SyncOutcome::Updated);
        assert_eq!(repo.list_all(None).await.unwrap().len(), 1);
        assert_eq!(index::entry_count(repo.pool(), created.course_id).await.unwrap(), 1);

        let stored = repo.get(created.course_id).await.unwrap().unwrap();
        assert_eq!(stored.title, second.title);
        assert_eq!(stored.last_crawled_at, second.last_crawled_at);

        let entry = index::get_entry(repo.pool(), created.course_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.title, second.title);
        assert_eq!(entry.tutoria.as_deref(), Some("Con tutor"));
    }

    #[tokio::test]
    async fn test_upsert_unchanged_refreshes_crawl_time_only() {
        let repo = CourseRepository::new(test_pool().await);
        let first = course("https://example.edu/curso/scrum", "Scrum");
        let created = repo.upsert(&first).await.unwrap();

        let mut recrawl = first.clone();
        recrawl.last_crawled_at = Utc.with_ymd_and_hms(2025, 9, 1, 0, 0, 0).unwrap();
        let outcome = repo.upsert(&recrawl).await.unwrap();

        assert_eq!(outcome.course_id, created.course_id);
        assert_eq!(outcome.outcome, SyncOutcome::Unchanged);
        let stored = repo.get(created.course_id).await.unwrap().unwrap();
        assert_eq!(stored.last_crawled_at, recrawl.last_crawled_at);
        assert_eq!(index::entry_count(repo.pool(), created.course_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rewrites_legacy_row_without_hash() {
        let repo = CourseRepository::new(test_pool().await);
        let new_course = course("https://example.edu/curso/legacy", "Excel básico");
        let created = repo.upsert(&new_course).await.unwrap();
        sqlx::query("UPDATE courses SET content_hash = NULL WHERE course_id = ?")
            .bind(created.course_id)
            .execute(repo.pool())
            .await
            .unwrap();

        let outcome = repo.upsert(&new_course).await.unwrap();
        assert_eq!(outcome.outcome, SyncOutcome::Updated);
        assert_eq!(index::entry_count(repo.pool(), created.course_id).await.unwrap(), 1);
        let stored = repo.get(created.course_id).await.unwrap().unwrap();
        assert_eq!(stored.content_hash.as_deref(), Some(new_course.content_hash().as_str()));
    }

    #[tokio::test]
    async fn test_upsert_normalizes_url_into_one_row() {
        let repo = CourseRepository::new(test_pool().await);
        let a = repo
            .upsert(&course("https://Example.edu/curso/excel#inicio", "Excel"))
            .await
            .unwrap();
        let b = repo
            .upsert(&course("https://example.edu/curso/excel", "Excel"))
            .await
            .unwrap();
        assert_eq!(a.course_id, b.course_id);

        let by_url = repo
            .get_by_url("HTTPS://EXAMPLE.EDU/curso/excel")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_url.course_id, a.course_id);
    }

    #[tokio::test]
    async fn test_upsert_rejects_untitled_course() {
        let repo = CourseRepository::new(test_pool().await);
        let result = repo.upsert(&course("https://example.edu/x", "  ")).await;
        assert!(matches!(result, Err(AppError::InvalidCourse(_))));
        assert!(repo.list_all(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_rolls_back_when_index_sync_fails() {
        let repo = CourseRepository::new(test_pool().await);
        let original = course("https://example.edu/curso/ia", "Fundamentos de IA");
        let created = repo.upsert(&original).await.unwrap();

        sqlx::query("DROP TABLE courses_fts")
            .execute(repo.pool())
            .await
            .unwrap();

        let mut changed = original.clone();
        changed.title = "Título nuevo".to_string();
        changed.description = Some("Otra descripción".to_string());
        let result = repo.upsert(&changed).await;
        assert!(matches!(result, Err(AppError::WriteConsistency(_))));

        let stored = repo.get(created.course_id).await.unwrap().unwrap();
        assert_eq!(stored.title, original.title);
        assert_eq!(stored.description, original.description);
        assert_eq!(stored.content_hash.as_deref(), Some(original.content_hash().as_str()));
    }

    #[tokio::test]
    async fn test_insert_rolls_back_when_index_sync_fails() {
        let repo = CourseRepository::new(test_pool().await);
        sqlx::query("DROP TABLE courses_fts")
            .execute(repo.pool())
            .await
            .unwrap();

        let result = repo
            .upsert(&course("https://example.edu/curso/ia", "Fundamentos de IA"))
            .await;
        assert!(matches!(result, Err(AppError::WriteConsistency(_))));
        assert!(repo.list_all(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_course_and_entry() {
        let repo = CourseRepository::new(test_pool().await);
        let created = repo
            .upsert(&course("https://example.edu/curso/ia", "Fundamentos de IA"))
            .await
            .unwrap();

        assert!(repo.delete(created.course_id).await.unwrap());
        assert!(repo.get(created.course_id).await.unwrap().is_none());
        assert_eq!(index::entry_count(repo.pool(), created.course_id).await.unwrap(), 0);

        assert!(!repo.delete(created.course_id).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_rolls_back_when_index_sync_fails() {
        let repo = CourseRepository::new(test_pool().await);
        let created = repo
            .upsert(&course("https://example.edu/curso/ia", "Fundamentos de IA"))
            .await
            .unwrap();
        sqlx::query("DROP TABLE courses_fts")
            .execute(repo.pool())
            .await
            .unwrap();

        let result = repo.delete(created.course_id).await;
        assert!(matches!(result, Err(AppError::WriteConsistency(_))));
        assert!(repo.get(created.course_id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_find_first_by_title() {
        let repo = CourseRepository::new(test_pool().await);
        repo.upsert(&course("https://example.edu/a", "Python básico"))
            .await
            .unwrap();
        let second = repo
            .upsert(&course("https://example.edu/b", "Python 100% práctico"))
            .await
            .unwrap();

        let found = repo.find_first_by_title("python").await.unwrap().unwrap();
        assert_eq!(found.title, "Python básico");

        let found = repo.find_first_by_title("100%").await.unwrap().unwrap();
        assert_eq!(found.course_id, second.course_id);

        assert!(repo.find_first_by_title("cobol").await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_upserts_on_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("cursos.sqlite").display());
        let pool = crate::connect(&url, &catalogo_core::config::DbConfig::default())
            .await
            .unwrap();
        crate::init_schema(&pool).await.unwrap();
        let repo = CourseRepository::new(pool);

        let handles: Vec<_> = (0..40)
            .map(|i| {
                let repo = repo.clone();
                tokio::spawn(async move {
                    repo.upsert(&course(
                        &format!("https://example.edu/curso/{}", i),
                        &format!("Curso {}", i),
                    ))
                    .await
                })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap().unwrap();
            assert_eq!(outcome.outcome, SyncOutcome::Created);
        }

        assert_eq!(repo.list_all(None).await.unwrap().len(), 40);
        assert_eq!(index::total_entries(repo.pool()).await.unwrap(), 40);
    }

    #[tokio::test]
    async fn test_get_stats() {
        let repo = CourseRepository::new(test_pool().await);
        repo.upsert(&course("https://example.edu/a", "Python"))
            .await
            .unwrap();
        repo.upsert(&course("https://example.edu/b", "Excel"))
            .await
            .unwrap();

        let stats = repo.get_stats().await.unwrap();
        assert_eq!(stats.total_courses, 2);
        assert_eq!(stats.indexed_entries, Some(2));
        assert_eq!(stats.total_terms, 0);
        assert!(stats.last_crawl.is_some());

        sqlx::query("DROP TABLE courses_fts")
            .execute(repo.pool())
            .await
            .unwrap();
        let stats = repo.get_stats().await.unwrap();
        assert_eq!(stats.indexed_entries, None);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_a\\b"), "100\\%\\_a\\\\b");
    }
}
