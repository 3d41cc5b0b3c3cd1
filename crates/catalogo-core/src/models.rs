//! Domain models for crawled courses and search results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use sqlx::FromRow;
use url::Url;

use crate::error::AppError;
use crate::sync::SyncOutcome;

/// A full row of the `courses` table.
#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct Course {
    pub course_id: i64,
    pub url: String,
    pub title: String,
    pub category: Option<String>,
    pub modality: Option<String>,
    pub duration: Option<String>,
    pub price: Option<String>,
    pub start_date: Option<String>,
    pub location: Option<String>,
    pub value_proposal: Option<String>,
    pub tutoria: Option<String>,
    pub description: Option<String>,
    #[serde(skip_serializing)]
    pub raw_html: Option<String>,
    pub last_crawled_at: DateTime<Utc>,
    pub content_hash: Option<String>,
}

impl Course {
    /// The five text fields mirrored by the search index.
    pub fn indexed_fields(&self) -> IndexedFields<'_> {
        IndexedFields {
            title: &self.title,
            description: self.description.as_deref(),
            category: self.category.as_deref(),
            value_proposal: self.value_proposal.as_deref(),
            tutoria: self.tutoria.as_deref(),
        }
    }

    /// Text used for course-to-course similarity.
    pub fn similarity_text(&self) -> String {
        [
            Some(self.title.as_str()),
            self.description.as_deref(),
            self.value_proposal.as_deref(),
            self.tutoria.as_deref(),
        ]
        .into_iter()
        .flatten()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// A course record as produced by the crawler, used for upsert-by-url.
///
/// # Examples
///
/// ```
/// use catalogo_core::models::NewCourse;
///
/// let line = r#"{"url": "https://example.edu/curso-ia", "title": "Fundamentos de IA"}"#;
/// let course: NewCourse = serde_json::from_str(line).unwrap();
/// assert_eq!(course.title, "Fundamentos de IA");
/// assert!(course.description.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCourse {
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub modality: Option<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub value_proposal: Option<String>,
    #[serde(default)]
    pub tutoria: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub raw_html: Option<String>,
    /// When the crawler fetched the page. Defaults to the time of parsing.
    #[serde(default = "Utc::now")]
    pub last_crawled_at: DateTime<Utc>,
}

impl NewCourse {
    /// Creates a record with only the required fields set, crawled now.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            category: None,
            modality: None,
            duration: None,
            price: None,
            start_date: None,
            location: None,
            value_proposal: None,
            tutoria: None,
            description: None,
            raw_html: None,
            last_crawled_at: Utc::now(),
        }
    }

    /// Checks required fields and returns a copy with the URL normalized.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidCourse` for a blank title and
    /// `AppError::InvalidUrl` for a URL that is not absolute http(s).
    pub fn validated(&self) -> Result<NewCourse, AppError> {
        if self.title.trim().is_empty() {
            return Err(AppError::InvalidCourse(format!(
                "course at {} has no title",
                self.url
            )));
        }
        let mut course = self.clone();
        course.url = normalize_course_url(&self.url)?;
        Ok(course)
    }

    /// The five text fields mirrored by the search index.
    pub fn indexed_fields(&self) -> IndexedFields<'_> {
        IndexedFields {
            title: &self.title,
            description: self.description.as_deref(),
            category: self.category.as_deref(),
            value_proposal: self.value_proposal.as_deref(),
            tutoria: self.tutoria.as_deref(),
        }
    }

    /// Computes a SHA-256 hash over every crawled attribute.
    ///
    /// The crawl timestamp is not part of the hash, so a re-crawl of an
    /// unchanged page produces the same value. Each field is length-prefixed
    /// so that moving text between adjacent fields changes the hash.
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        let fields = [
            Some(self.url.as_str()),
            Some(self.title.as_str()),
            self.category.as_deref(),
            self.modality.as_deref(),
            self.duration.as_deref(),
            self.price.as_deref(),
            self.start_date.as_deref(),
            self.location.as_deref(),
            self.value_proposal.as_deref(),
            self.tutoria.as_deref(),
            self.description.as_deref(),
            self.raw_html.as_deref(),
        ];
        for field in fields {
            match field {
                Some(value) => {
                    hasher.update(b"S");
                    hasher.update((value.len() as u64).to_le_bytes());
                    hasher.update(value.as_bytes());
                }
                None => hasher.update(b"N"),
            }
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Borrowed view of the columns mirrored into the full-text index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedFields<'a> {
    pub title: &'a str,
    pub description: Option<&'a str>,
    pub category: Option<&'a str>,
    pub value_proposal: Option<&'a str>,
    pub tutoria: Option<&'a str>,
}

impl<'a> IndexedFields<'a> {
    /// Iterates over the non-null field values.
    pub fn values(&self) -> impl Iterator<Item = &'a str> {
        [
            Some(self.title),
            self.description,
            self.category,
            self.value_proposal,
            self.tutoria,
        ]
        .into_iter()
        .flatten()
    }
}

/// Result of an upsert-by-url.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub course_id: i64,
    pub outcome: SyncOutcome,
}

/// Which strategy served a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPath {
    /// Relevance-ranked lookup in the full-text index.
    Index,
    /// Substring scan of the `courses` table, ordered by id.
    FallbackScan,
}

impl SearchPath {
    /// Picks the strategy for one search.
    pub fn select(index_available: bool, force_fallback: bool) -> Self {
        if index_available && !force_fallback {
            SearchPath::Index
        } else {
            SearchPath::FallbackScan
        }
    }
}

impl std::fmt::Display for SearchPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchPath::Index => write!(f, "index"),
            SearchPath::FallbackScan => write!(f, "fallback scan"),
        }
    }
}

/// One ranked course in a search response.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub course: Course,
    /// Relevance score, higher is better. `None` on the fallback path.
    pub score: Option<f64>,
}

/// Ordered search results plus the path that produced them.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResponse {
    pub path: SearchPath,
    /// The match expression that was executed, in FTS5 syntax.
    pub expression: String,
    pub hits: Vec<SearchHit>,
}

impl SearchResponse {
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Course ids in result order.
    pub fn course_ids(&self) -> Vec<i64> {
        self.hits.iter().map(|hit| hit.course.course_id).collect()
    }
}

/// Aggregated catalog statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogStats {
    pub total_courses: i64,
    pub indexed_entries: Option<i64>,
    pub total_terms: i64,
    pub total_synonyms: i64,
    pub last_crawl: Option<DateTime<Utc>>,
}

/// Normalizes a course URL for use as the natural key.
///
/// Only absolute `http`/`https` URLs with a host are accepted. Scheme and
/// host are lowercased and the fragment is dropped; path and query are kept.
///
/// # Examples
///
/// ```
/// use catalogo_core::models::normalize_course_url;
///
/// let url = normalize_course_url("HTTPS://Example.EDU/Cursos/IA?x=1#temario").unwrap();
/// assert_eq!(url, "https://example.edu/Cursos/IA?x=1");
/// ```
pub fn normalize_course_url(raw: &str) -> Result<String, AppError> {
    let trimmed = raw.trim();
    let mut url = Url::parse(trimmed).map_err(|e| AppError::InvalidUrl(format!("{trimmed}: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(AppError::InvalidUrl(trimmed.to_string()));
    }
    url.set_fragment(None);
    Ok(url.to_string())
}
