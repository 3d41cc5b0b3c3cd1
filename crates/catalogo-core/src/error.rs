use thiserror::Error;

/// Application-wide error types.
///
/// This enum represents every failure a Catalogo operation can surface. Search
/// callers get `InvalidQuery`, `QuerySyntax` or `StoreUnavailable`; writers get
/// `WriteConsistency` when the index could not be kept in step with the
/// `courses` table, in which case nothing from that write was committed.
///
/// # Error Conversion
///
/// - `sqlx::Error` → `AppError::StoreUnavailable` for connectivity failures
///   (pool timeout, closed pool, I/O, busy or locked database), otherwise
///   `AppError::DatabaseError`
/// - `serde_json::Error` → `AppError::SerializationError`
/// - `std::io::Error` → `AppError::IoError`
///
/// # Examples
///
/// ```no_run
/// use catalogo_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::InvalidQuery("search term is empty".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// Database operation failed for a reason other than connectivity.
    ///
    /// Constraint violations, decode failures and unexpected SQL errors
    /// end up here.
    #[error("Database error: {0}")]
    DatabaseError(sqlx::Error),

    /// The durable store could not be reached.
    ///
    /// Retryable by the caller, ideally with backoff.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// The search input cannot be turned into a query (empty, blank, or
    /// without any searchable character). Correctable by the user.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// An expanded match expression was malformed or rejected by the
    /// full-text engine.
    #[error("Query syntax error: {0}")]
    QuerySyntax(String),

    /// The full-text index is missing or unreadable.
    ///
    /// Never returned from a search: the search executor reacts to it by
    /// serving the request from the fallback scan.
    #[error("Search index unavailable: {0}")]
    IndexUnavailable(String),

    /// Index synchronization failed inside a course write. The whole write
    /// was rolled back.
    #[error("Write consistency error: {0}")]
    WriteConsistency(String),

    /// A vocabulary term or synonym is blank after normalization.
    #[error("Invalid vocabulary entry: {0}")]
    InvalidTerm(String),

    /// A crawled course record is missing required data.
    #[error("Invalid course: {0}")]
    InvalidCourse(String),

    /// A course URL is not an absolute http(s) URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Course not found in the catalog.
    #[error("Course not found: {0}")]
    CourseNotFound(String),

    /// Term not found in the vocabulary.
    #[error("Term not found: {0}")]
    TermNotFound(String),

    /// JSON serialization or deserialization failed.
    ///
    /// Typically raised while reading crawler output (JSON Lines).
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A configuration or vocabulary file could not be parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Reading a local file failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// SQLite primary result codes that mean the store itself is unreachable.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;
const SQLITE_CANTOPEN: i32 = 14;

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
            | sqlx::Error::Io(_) => AppError::StoreUnavailable(err.to_string()),
            sqlx::Error::Database(db) => {
                let primary = db
                    .code()
                    .and_then(|code| code.parse::<i32>().ok())
                    .map(|code| code & 0xff);
                match primary {
                    Some(SQLITE_BUSY | SQLITE_LOCKED | SQLITE_CANTOPEN) => {
                        AppError::StoreUnavailable(err.to_string())
                    }
                    _ => AppError::DatabaseError(err),
                }
            }
            _ => AppError::DatabaseError(err),
        }
    }
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::StoreUnavailable(msg) => {
                format!(
                    "Cannot reach the course database: {}\n   Check the --database-url path and retry.",
                    msg
                )
            }
            AppError::InvalidQuery(msg) => {
                format!(
                    "Invalid search: {}\n   Example: catalogo search \"inteligencia artificial, python\"",
                    msg
                )
            }
            AppError::WriteConsistency(msg) => {
                format!(
                    "Write rolled back, the search index could not be updated: {}\n   Try: catalogo reindex",
                    msg
                )
            }
            AppError::InvalidUrl(url) => {
                format!(
                    "Invalid course URL: {}\n   Example: https://educacionvirtual.javeriana.edu.co/curso",
                    url
                )
            }
            AppError::TermNotFound(term) => {
                format!(
                    "Term '{}' is not in the vocabulary.\n   Try: catalogo terms add {}",
                    term, term
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use catalogo_core::error::AppError;
    ///
    /// let err = AppError::StoreUnavailable("database is locked".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::InvalidQuery("empty".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AppError::CourseNotFound("42".to_string());
        assert_eq!(err.to_string(), "Course not found: 42");
    }

    #[test]
    fn test_invalid_query_display() {
        let err = AppError::InvalidQuery("search term is empty".to_string());
        assert_eq!(err.to_string(), "Invalid query: search term is empty");
    }

    #[test]
    fn test_error_from_serde() {
        let json = "{ invalid json }";
        let result: Result<serde_json::Value, _> = serde_json::from_str(json);
        let serde_err = result.unwrap_err();
        let app_err: AppError = serde_err.into();
        assert!(matches!(app_err, AppError::SerializationError(_)));
    }

    #[test]
    fn test_pool_timeout_is_store_unavailable() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, AppError::StoreUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_row_not_found_is_database_error() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::DatabaseError(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_is_retryable() {
        assert!(AppError::StoreUnavailable("closed".to_string()).is_retryable());
        assert!(!AppError::WriteConsistency("fts".to_string()).is_retryable());
        assert!(!AppError::QuerySyntax("unbalanced".to_string()).is_retryable());
        assert!(!AppError::IndexUnavailable("missing".to_string()).is_retryable());
    }

    #[test]
    fn test_user_message_write_consistency() {
        let err = AppError::WriteConsistency("no such table: courses_fts".to_string());
        assert!(err.user_message().contains("catalogo reindex"));
    }

    #[test]
    fn test_user_message_term_not_found() {
        let err = AppError::TermNotFound("ia".to_string());
        assert!(err.user_message().contains("catalogo terms add ia"));
    }
}
