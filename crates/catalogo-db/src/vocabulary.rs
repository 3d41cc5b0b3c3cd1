//! Vocabulary store: curated terms and their synonyms.
//!
//! Terms are stored normalized (see [`normalize_term`]) so lookups from the
//! query expander match regardless of the case or spacing the user typed.
//! Deleting a term removes its synonyms through `ON DELETE CASCADE`.

use catalogo_core::config::{TermEntry, VocabularyFile};
use catalogo_core::error::AppError;
use catalogo_core::expansion::{normalize_term, SynonymSource};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

use crate::pool::begin_write;

#[derive(Clone)]
pub struct VocabularyRepository {
    pool: SqlitePool,
}

impl VocabularyRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a term, returning its id. Registering an existing term
    /// returns the existing id.
    pub async fn add_term(&self, term: &str) -> Result<i64, AppError> {
        let mut conn = self.pool.acquire().await?;
        upsert_term(&mut *conn, term).await
    }

    /// Attaches a synonym to a registered term. Adding the same synonym twice
    /// is a no-op; returns whether a row was inserted.
    pub async fn add_synonym(&self, term: &str, synonym: &str) -> Result<bool, AppError> {
        let mut conn = self.pool.acquire().await?;
        let term_id = lookup_term_id(&mut *conn, term)
            .await?
            .ok_or_else(|| AppError::TermNotFound(term.trim().to_string()))?;
        insert_synonym(&mut *conn, term_id, synonym).await
    }

    /// Registers a term together with its synonyms in one transaction.
    pub async fn add_term_with_synonyms(
        &self,
        term: &str,
        synonyms: &[String],
    ) -> Result<i64, AppError> {
        let mut tx = begin_write(&self.pool).await?;
        let term_id = upsert_term(&mut *tx, term).await?;
        for synonym in synonyms {
            insert_synonym(&mut *tx, term_id, synonym).await?;
        }
        tx.commit().await?;
        Ok(term_id)
    }

    /// Detaches one synonym. Returns whether it existed.
    pub async fn remove_synonym(&self, term: &str, synonym: &str) -> Result<bool, AppError> {
        let term = normalize_vocabulary_entry(term)?;
        let synonym = normalize_vocabulary_entry(synonym)?;
        let result = sqlx::query(
            r#"
            DELETE FROM synonyms
            WHERE synonym = ?
              AND term_id = (SELECT term_id FROM terms WHERE term = ?)
            "#,
        )
        .bind(&synonym)
        .bind(&term)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Deletes a term and, by cascade, all of its synonyms.
    ///
    /// # Errors
    ///
    /// `TermNotFound` if the term is not registered.
    pub async fn delete_term(&self, term: &str) -> Result<(), AppError> {
        let term = normalize_vocabulary_entry(term)?;
        let result = sqlx::query("DELETE FROM terms WHERE term = ?")
            .bind(&term)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::TermNotFound(term));
        }
        info!(%term, "vocabulary term deleted");
        Ok(())
    }

    /// Lists every term with its synonyms, terms alphabetically and synonyms
    /// in insertion order.
    pub async fn list_terms(&self) -> Result<Vec<TermEntry>, AppError> {
        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            r#"
            SELECT t.term, s.synonym
            FROM terms t
            LEFT JOIN synonyms s ON s.term_id = t.term_id
            ORDER BY t.term, s.synonym_id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut entries: Vec<TermEntry> = Vec::new();
        for (term, synonym) in rows {
            match entries.last_mut() {
                Some(last) if last.term == term => last.synonyms.extend(synonym),
                _ => entries.push(TermEntry {
                    term,
                    synonyms: synonym.into_iter().collect(),
                }),
            }
        }
        Ok(entries)
    }

    /// Loads a vocabulary file in one transaction. Existing terms keep their
    /// synonyms and gain the new ones. Returns `(terms, synonyms added)`.
    pub async fn import(&self, vocabulary: &VocabularyFile) -> Result<(usize, usize), AppError> {
        let mut tx = begin_write(&self.pool).await?;
        let mut added = 0;
        for entry in &vocabulary.terms {
            let term_id = upsert_term(&mut *tx, &entry.term).await?;
            for synonym in &entry.synonyms {
                if insert_synonym(&mut *tx, term_id, synonym).await? {
                    added += 1;
                }
            }
        }
        tx.commit().await?;

        info!(terms = vocabulary.terms.len(), synonyms = added, "vocabulary imported");
        Ok((vocabulary.terms.len(), added))
    }
}

impl SynonymSource for VocabularyRepository {
    async fn synonyms_for(&self, term: &str) -> Result<Option<Vec<String>>, AppError> {
        let rows: Vec<(Option<String>,)> = sqlx::query_as(
            r#"
            SELECT s.synonym
            FROM terms t
            LEFT JOIN synonyms s ON s.term_id = t.term_id
            WHERE t.term = ?
            ORDER BY s.synonym_id
            "#,
        )
        .bind(term)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            return Ok(None);
        }
        Ok(Some(rows.into_iter().filter_map(|(s,)| s).collect()))
    }
}

fn normalize_vocabulary_entry(raw: &str) -> Result<String, AppError> {
    normalize_term(raw).map_err(|_| AppError::InvalidTerm(format!("'{}' is not a valid term", raw.trim())))
}

async fn lookup_term_id(conn: &mut SqliteConnection, term: &str) -> Result<Option<i64>, AppError> {
    let term = normalize_vocabulary_entry(term)?;
    let row: Option<(i64,)> = sqlx::query_as("SELECT term_id FROM terms WHERE term = ?")
        .bind(&term)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row.map(|(id,)| id))
}

async fn upsert_term(conn: &mut SqliteConnection, term: &str) -> Result<i64, AppError> {
    let term = normalize_vocabulary_entry(term)?;
    let (term_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO terms (term) VALUES (?)
        ON CONFLICT(term) DO UPDATE SET term = excluded.term
        RETURNING term_id
        "#,
    )
    .bind(&term)
    .fetch_one(&mut *conn)
    .await?;
    Ok(term_id)
}

async fn insert_synonym(
    conn: &mut SqliteConnection,
    term_id: i64,
    synonym: &str,
) -> Result<bool, AppError> {
    let synonym = normalize_vocabulary_entry(synonym)?;
    let result = sqlx::query("INSERT OR IGNORE INTO synonyms (term_id, synonym) VALUES (?, ?)")
        .bind(term_id)
        .bind(&synonym)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
