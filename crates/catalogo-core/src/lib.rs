//! Catalogo Core - Domain types, query expansion, error handling, and configuration.

pub mod config;
pub mod error;
pub mod expansion;
pub mod models;
pub mod similarity;
pub mod sync;
pub mod text;

pub use config::{
    default_config_path, load_config, load_vocabulary_file, AppConfig, DbConfig, SearchConfig,
    SyncConfig, TermEntry, VocabularyFile,
};
pub use error::AppError;
pub use expansion::{normalize_term, MatchExpression, QueryExpander, SynonymSource, TermGroup};
pub use models::{
    normalize_course_url, CatalogStats, Course, IndexedFields, NewCourse, SearchHit, SearchPath,
    SearchResponse, UpsertOutcome,
};
pub use sync::{
    needs_reprocessing, BatchIngestSummary, FileIngestResult, ReprocessingDecision, SyncOutcome,
    SyncStats,
};
