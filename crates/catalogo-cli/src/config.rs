use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "catalogo")]
#[command(
    author,
    version,
    about = "Synonym-expanding full-text search over crawled course listings"
)]
#[command(after_help = "Examples:
  catalogo init
  catalogo ingest data/cursos.jsonl
  catalogo terms import vocabulario.toml
  catalogo search \"ia, python\" --limit 5
  catalogo export --format csv > cursos.csv
  catalogo stats")]
pub struct Config {
    /// SQLite database connection URL
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite:data/cursos.sqlite")]
    pub database_url: String,

    /// Path to a config.toml (defaults to the user config directory)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the catalog tables, the search index and the vocabulary tables
    Init,
    /// Load crawler output (JSON Lines, one course per line) into the catalog
    #[command(after_help = "Examples:
  catalogo ingest data/cursos.jsonl
  catalogo ingest data/*.jsonl --concurrency 4")]
    Ingest {
        /// JSON Lines files produced by the crawler
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        /// Number of course writes in flight at once
        #[arg(short, long)]
        concurrency: Option<usize>,
    },
    /// Search courses by interests, expanded through the vocabulary
    #[command(after_help = "Example: catalogo search \"inteligencia artificial, python\" --limit 10")]
    Search {
        /// Comma-separated interests
        query: String,
        /// Maximum number of results to return
        #[arg(short, long)]
        limit: Option<usize>,
        /// Skip the index and scan the catalog directly
        #[arg(long)]
        fallback: bool,
    },
    /// Delete a course and its index entry
    Delete {
        /// Id of the course to delete
        course_id: i64,
    },
    /// Curate the term vocabulary
    Terms {
        #[command(subcommand)]
        action: TermsCommand,
    },
    /// Export catalog courses to various formats
    #[command(after_help = "Examples:
  catalogo export --format jsonl > cursos.jsonl
  catalogo export --format csv --limit 100")]
    Export {
        /// Output format for exported data
        #[arg(short, long, default_value = "jsonl")]
        format: ExportFormat,
        /// Maximum number of courses to export
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Show database statistics
    Stats,
    /// Rebuild the search index from the catalog
    Reindex,
    /// Compare two courses by text similarity
    #[command(after_help = "Examples:
  catalogo compare --ids 3 17
  catalogo compare --titles \"python\" \"machine learning\"")]
    Compare {
        #[command(flatten)]
        target: CompareTarget,
    },
}

/// Vocabulary subcommands
#[derive(Subcommand, Debug)]
pub enum TermsCommand {
    /// List every term with its synonyms
    List,
    /// Register a term, optionally with synonyms
    Add {
        term: String,
        synonyms: Vec<String>,
    },
    /// Detach one synonym from a term
    RemoveSynonym { term: String, synonym: String },
    /// Delete a term together with all of its synonyms
    Delete { term: String },
    /// Load terms and synonyms from a TOML vocabulary file
    Import {
        #[arg(value_name = "PATH")]
        file: PathBuf,
    },
}

/// The two courses to compare, addressed one way.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct CompareTarget {
    /// Compare by course id
    #[arg(long, num_args = 2, value_names = ["ID_A", "ID_B"])]
    pub ids: Option<Vec<i64>>,
    /// Compare by course URL
    #[arg(long, num_args = 2, value_names = ["URL_A", "URL_B"])]
    pub urls: Option<Vec<String>>,
    /// Compare the first course whose title contains each string
    #[arg(long, num_args = 2, value_names = ["CONTAINS_A", "CONTAINS_B"])]
    pub titles: Option<Vec<String>>,
}

/// How a course is looked up for comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CourseRef {
    Id(i64),
    Url(String),
    TitleContains(String),
}

impl CompareTarget {
    /// The pair of course references, in command-line order.
    pub fn refs(&self) -> Option<(CourseRef, CourseRef)> {
        if let Some([a, b]) = self.ids.as_deref() {
            return Some((CourseRef::Id(*a), CourseRef::Id(*b)));
        }
        if let Some([a, b]) = self.urls.as_deref() {
            return Some((CourseRef::Url(a.clone()), CourseRef::Url(b.clone())));
        }
        if let Some([a, b]) = self.titles.as_deref() {
            return Some((
                CourseRef::TitleContains(a.clone()),
                CourseRef::TitleContains(b.clone()),
            ));
        }
        None
    }
}

/// Supported export formats
#[derive(Debug, Clone, ValueEnum)]
pub enum ExportFormat {
    /// JSON Lines format (one JSON object per line)
    Jsonl,
    /// Standard JSON array format
    Json,
    /// CSV format (comma-separated values)
    Csv,
}
