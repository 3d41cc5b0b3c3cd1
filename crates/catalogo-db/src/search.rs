//! Search executor: runs expanded match expressions against the catalog.
//!
//! The primary path queries the FTS5 index and ranks by relevance, then
//! recency, then course id. When the index is missing or unreadable, or when
//! the fallback is forced, the executor scans `courses` for case- and
//! accent-insensitive phrase matches on token boundaries and orders them by
//! course id. The returned [`SearchResponse`] says which path served it.

use catalogo_core::config::SearchConfig;
use catalogo_core::error::AppError;
use catalogo_core::expansion::{MatchExpression, QueryExpander};
use catalogo_core::models::{Course, SearchHit, SearchPath, SearchResponse};
use catalogo_core::text::{contains_tokens, fold_tokens};
use futures::TryStreamExt;
use sqlx::{FromRow, SqlitePool};
use tracing::{debug, warn};

use crate::index;
use crate::repository::COURSE_COLUMNS;
use crate::vocabulary::VocabularyRepository;

/// Same columns as [`COURSE_COLUMNS`], qualified for the index join.
const JOINED_COURSE_COLUMNS: &str = "c.course_id, c.url, c.title, c.category, c.modality, c.duration, c.price, c.start_date, c.location, c.value_proposal, c.tutoria, c.description, c.raw_html, c.last_crawled_at, c.content_hash";

#[derive(FromRow)]
struct RankedRow {
    #[sqlx(flatten)]
    course: Course,
    score: f64,
}

/// Expands user terms through the vocabulary and executes them.
///
/// # Examples
///
/// ```no_run
/// use catalogo_core::config::{DbConfig, SearchConfig};
/// use catalogo_db::{connect, SearchService};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = connect("sqlite:data/cursos.sqlite", &DbConfig::default()).await?;
/// let search = SearchService::new(pool, SearchConfig::default());
///
/// let response = search.search("IA").await?;
/// println!("{} results via {}", response.hits.len(), response.path);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SearchService {
    pool: SqlitePool,
    expander: QueryExpander<VocabularyRepository>,
    config: SearchConfig,
}

impl SearchService {
    pub fn new(pool: SqlitePool, config: SearchConfig) -> Self {
        let expander = QueryExpander::new(VocabularyRepository::new(pool.clone()));
        Self {
            pool,
            expander,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Searches for one raw term and its synonyms.
    ///
    /// # Errors
    ///
    /// `InvalidQuery` for blank input, `QuerySyntax` if the expression is
    /// rejected, `StoreUnavailable` if the database cannot be reached.
    pub async fn search(&self, raw: &str) -> Result<SearchResponse, AppError> {
        let expression = self.expander.expand(raw).await?;
        self.execute(&expression).await
    }

    /// Searches for a comma-separated list of interests, e.g. `"ia, python"`.
    pub async fn search_interests(&self, list: &str) -> Result<SearchResponse, AppError> {
        let expression = self.expander.expand_interests(list).await?;
        self.execute(&expression).await
    }

    /// Executes an already expanded expression.
    pub async fn execute(&self, expression: &MatchExpression) -> Result<SearchResponse, AppError> {
        let rendered = expression.to_fts5()?;

        let index_available = if self.config.force_fallback {
            false
        } else {
            index::availability(&self.pool).await?
        };

        let (path, hits) = match SearchPath::select(index_available, self.config.force_fallback) {
            SearchPath::Index => match self.index_search(&rendered).await {
                Ok(hits) => (SearchPath::Index, hits),
                Err(AppError::IndexUnavailable(reason)) => {
                    warn!(%reason, "index query failed, using fallback scan");
                    (SearchPath::FallbackScan, self.fallback_scan(expression).await?)
                }
                Err(e) => return Err(e),
            },
            SearchPath::FallbackScan => (SearchPath::FallbackScan, self.fallback_scan(expression).await?),
        };

        debug!(
            expression = %rendered,
            path = %path,
            results = hits.len(),
            "search executed"
        );
        Ok(SearchResponse {
            path,
            expression: rendered,
            hits,
        })
    }

    async fn index_search(&self, rendered: &str) -> Result<Vec<SearchHit>, AppError> {
        let query = format!(
            r#"
            SELECT {}, -bm25(courses_fts) AS score
            FROM courses_fts
            JOIN courses c ON c.course_id = courses_fts.rowid
            WHERE courses_fts MATCH ?
            ORDER BY bm25(courses_fts) ASC, c.last_crawled_at DESC, c.course_id ASC
            LIMIT ?
            "#,
            JOINED_COURSE_COLUMNS
        );
        let rows = sqlx::query_as::<_, RankedRow>(&query)
            .bind(rendered)
            .bind(self.config.limit as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(index::classify_query_error)?;

        Ok(rows
            .into_iter()
            .map(|row| SearchHit {
                course: row.course,
                score: Some(row.score),
            })
            .collect())
    }

    async fn fallback_scan(&self, expression: &MatchExpression) -> Result<Vec<SearchHit>, AppError> {
        let phrases: Vec<Vec<String>> = expression.phrases().into_iter().map(fold_tokens).collect();
        let query = format!("SELECT {} FROM courses ORDER BY course_id", COURSE_COLUMNS);
        let mut rows = sqlx::query_as::<_, Course>(&query).fetch(&self.pool);

        let mut hits = Vec::new();
        while let Some(course) = rows.try_next().await? {
            if matches_any(&course, &phrases) {
                hits.push(SearchHit {
                    course,
                    score: None,
                });
                if hits.len() >= self.config.limit {
                    break;
                }
            }
        }
        Ok(hits)
    }
}

/// A phrase matches a field when its tokens appear there contiguously,
/// mirroring FTS5 phrase semantics so both paths agree on membership.
fn matches_any(course: &Course, phrases: &[Vec<String>]) -> bool {
    course.indexed_fields().values().any(|value| {
        let tokens = fold_tokens(value);
        phrases.iter().any(|phrase| contains_tokens(&tokens, phrase))
    })
}
