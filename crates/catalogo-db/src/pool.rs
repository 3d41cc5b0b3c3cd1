//! Connection pool setup.

use std::str::FromStr;

use catalogo_core::config::DbConfig;
use catalogo_core::error::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

/// Opens a pool on a SQLite database, creating the file if needed.
///
/// Foreign keys are enforced on every connection, which the synonym cascade
/// relies on. An in-memory database is private to one connection, so its
/// pool is capped at a single connection that is never recycled.
///
/// # Examples
///
/// ```no_run
/// use catalogo_core::config::DbConfig;
/// use catalogo_db::connect;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = connect("sqlite:data/cursos.sqlite", &DbConfig::default()).await?;
/// # Ok(())
/// # }
/// ```
pub async fn connect(database_url: &str, config: &DbConfig) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout());

    if is_in_memory(database_url) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        return Ok(pool);
    }

    if let Some(parent) = options.get_filename().parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options.journal_mode(SqliteJournalMode::Wal))
        .await?;
    Ok(pool)
}

/// Starts a write transaction that takes the database write lock up front.
///
/// A deferred transaction that reads first and writes later cannot be
/// upgraded while another connection holds the lock, and SQLite reports
/// `SQLITE_BUSY` without waiting. `BEGIN IMMEDIATE` waits on the busy
/// timeout instead.
pub async fn begin_write(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>, AppError> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}
