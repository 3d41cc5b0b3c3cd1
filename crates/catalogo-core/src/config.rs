//! Configuration types for Catalogo components.
//!
//! Settings come from an optional TOML file (by default
//! `<config dir>/catalogo/config.toml`); every key has a default, so an empty
//! or missing default file is valid. CLI flags override file values.
//!
//! ```toml
//! [database]
//! max_connections = 5
//! busy_timeout_ms = 5000
//!
//! [search]
//! limit = 20
//! force_fallback = false
//!
//! [ingest]
//! concurrency = 10
//! ```
//!
//! Vocabulary files use the same format family:
//!
//! ```toml
//! [[term]]
//! term = "ia"
//! synonyms = ["inteligencia artificial", "machine learning"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Database connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    pub max_connections: u32,
    /// How long a connection waits on a locked database before giving up.
    pub busy_timeout_ms: u64,
}

impl DbConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

/// Search executor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Maximum number of results returned by one search.
    pub limit: usize,
    /// Serve every search from the fallback scan, even if the index is healthy.
    pub force_fallback: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            limit: 20,
            force_fallback: false,
        }
    }
}

/// Crawl ingest configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Number of course upserts in flight at once.
    pub concurrency: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { concurrency: 10 }
    }
}

/// Root of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DbConfig,
    pub search: SearchConfig,
    pub ingest: SyncConfig,
}

/// Returns the default configuration file path.
///
/// `None` if the platform has no configuration directory.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("catalogo").join("config.toml"))
}

/// Loads the configuration.
///
/// With an explicit path the file must exist. Without one, the default path
/// is used if present and built-in defaults otherwise.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, AppError> {
    match path {
        Some(path) => parse_config_file(path),
        None => match default_config_path() {
            Some(default) if default.exists() => parse_config_file(&default),
            _ => Ok(AppConfig::default()),
        },
    }
}

fn parse_config_file(path: &Path) -> Result<AppConfig, AppError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content).map_err(|e| match e {
        AppError::ConfigError(msg) => AppError::ConfigError(format!("{}: {}", path.display(), msg)),
        other => other,
    })
}

/// Parses configuration from TOML text.
pub fn parse_config(content: &str) -> Result<AppConfig, AppError> {
    let config: AppConfig =
        toml::from_str(content).map_err(|e| AppError::ConfigError(e.to_string()))?;
    if config.database.max_connections == 0 {
        return Err(AppError::ConfigError(
            "database.max_connections must be at least 1".to_string(),
        ));
    }
    if config.search.limit == 0 {
        return Err(AppError::ConfigError(
            "search.limit must be at least 1".to_string(),
        ));
    }
    if config.ingest.concurrency == 0 {
        return Err(AppError::ConfigError(
            "ingest.concurrency must be at least 1".to_string(),
        ));
    }
    Ok(config)
}

/// One curated term and its synonyms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermEntry {
    pub term: String,
    #[serde(default)]
    pub synonyms: Vec<String>,
}

/// A vocabulary file, as maintained by the vocabulary curator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabularyFile {
    #[serde(default, rename = "term")]
    pub terms: Vec<TermEntry>,
}

/// Loads a vocabulary file from disk.
pub fn load_vocabulary_file(path: &Path) -> Result<VocabularyFile, AppError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| AppError::ConfigError(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.busy_timeout(), Duration::from_secs(5));
        assert_eq!(config.search.limit, 20);
        assert!(!config.search.force_fallback);
        assert_eq!(config.ingest.concurrency, 10);
    }

    #[test]
    fn test_parse_partial_config_keeps_defaults() {
        let config = parse_config(
            r#"
            [search]
            force_fallback = true
            "#,
        )
        .unwrap();
        assert!(config.search.force_fallback);
        assert_eq!(config.search.limit, 20);
        assert_eq!(config.database, DbConfig::default());
    }

    #[test]
    fn test_parse_rejects_zero_limit() {
        let result = parse_config("[search]\nlimit = 0\n");
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_parse_rejects_bad_toml() {
        let result = parse_config("[database\nmax_connections = 5");
        assert!(matches!(result, Err(AppError::ConfigError(_))));
    }

    #[test]
    fn test_load_config_explicit_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[ingest]\nconcurrency = 3").unwrap();
        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.ingest.concurrency, 3);
    }

    #[test]
    fn test_load_config_missing_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("absent.toml")));
        assert!(matches!(result, Err(AppError::IoError(_))));
    }

    #[test]
    fn test_load_vocabulary_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[[term]]
term = "ia"
synonyms = ["inteligencia artificial", "machine learning"]

[[term]]
term = "python"
"#
        )
        .unwrap();
        let vocabulary = load_vocabulary_file(file.path()).unwrap();
        assert_eq!(vocabulary.terms.len(), 2);
        assert_eq!(vocabulary.terms[0].synonyms.len(), 2);
        assert!(vocabulary.terms[1].synonyms.is_empty());
    }
}
