//! Loading crawler output into the catalog.
//!
//! The crawler writes JSON Lines, one [`NewCourse`] per line. Each file is
//! read whole, then its records are upserted concurrently. A bad record is
//! counted as failed and never aborts the rest of the file.

use std::path::Path;

use catalogo_core::error::AppError;
use catalogo_core::models::NewCourse;
use catalogo_core::sync::{BatchIngestSummary, FileIngestResult, SyncOutcome, SyncStats};
use catalogo_db::CourseRepository;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

/// Parses JSON Lines content. Blank lines are skipped; each other line yields
/// its 1-based line number and either a course or the decode error.
pub fn parse_records(content: &str) -> Vec<(usize, Result<NewCourse, AppError>)> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| (i + 1, parse_record(line)))
        .collect()
}

fn parse_record(line: &str) -> Result<NewCourse, AppError> {
    Ok(serde_json::from_str::<NewCourse>(line)?)
}

/// Ingests one crawler output file.
pub async fn ingest_file(
    repo: &CourseRepository,
    path: &Path,
    concurrency: usize,
) -> FileIngestResult {
    let source = path.display().to_string();

    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) => {
            error!("Failed to read {}: {}", source, e);
            return FileIngestResult::failure(source, e.to_string());
        }
    };

    let records = parse_records(&content);
    let total = records.len();
    info!("Ingesting {} records from {}", total, source);

    let outcomes: Vec<SyncOutcome> = stream::iter(records.into_iter().enumerate())
        .map(|(i, (line, record))| {
            let repo = repo.clone();
            let source = source.as_str();
            async move {
                let new_course = match record {
                    Ok(new_course) => new_course,
                    Err(e) => {
                        warn!(
                            "[{}/{}] Skipping malformed record at {}:{}: {}",
                            i + 1,
                            total,
                            source,
                            line,
                            e
                        );
                        return SyncOutcome::Failed;
                    }
                };
                match repo.upsert(&new_course).await {
                    Ok(result) => {
                        debug!(
                            "[{}/{}] {:?}: {} (course {})",
                            i + 1,
                            total,
                            result.outcome,
                            new_course.title,
                            result.course_id
                        );
                        result.outcome
                    }
                    Err(e) => {
                        error!("[{}/{}] Failed to save {}: {}", i + 1, total, new_course.url, e);
                        SyncOutcome::Failed
                    }
                }
            }
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    let mut stats = SyncStats::new();
    for outcome in outcomes {
        stats.record(outcome);
    }
    info!(
        "Finished {}: {} created, {} updated, {} unchanged, {} failed",
        source, stats.created, stats.updated, stats.unchanged, stats.failed
    );
    FileIngestResult::success(source, stats)
}

/// Ingests several files one after the other.
pub async fn ingest_files<P: AsRef<Path>>(
    repo: &CourseRepository,
    paths: &[P],
    concurrency: usize,
) -> BatchIngestSummary {
    let mut summary = BatchIngestSummary::new();
    for path in paths {
        summary.add(ingest_file(repo, path.as_ref(), concurrency).await);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalogo_core::config::DbConfig;
    use std::io::Write;

    async fn test_repo() -> CourseRepository {
        let pool = catalogo_db::connect("sqlite::memory:", &DbConfig::default())
            .await
            .unwrap();
        catalogo_db::init_schema(&pool).await.unwrap();
        CourseRepository::new(pool)
    }

    #[test]
    fn test_parse_records_skips_blank_lines_and_reports_bad_ones() {
        let content = r#"{"url": "https://example.edu/a", "title": "Scrum"}

not json
{"url": "https://example.edu/b", "title": "Excel", "modality": "Online"}
"#;
        let records = parse_records(content);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].0, 1);
        assert!(records[0].1.is_ok());
        assert_eq!(records[1].0, 3);
        assert!(matches!(records[1].1, Err(AppError::SerializationError(_))));
        assert_eq!(records[2].0, 4);
        assert_eq!(
            records[2].1.as_ref().unwrap().modality.as_deref(),
            Some("Online")
        );
    }

    #[tokio::test]
    async fn test_ingest_file_counts_outcomes() {
        let repo = test_repo().await;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"url": "https://example.edu/a", "title": "Scrum"}}
{{"url": "https://example.edu/b", "title": "   "}}
{{"url": "https://example.edu/c", "title": "Excel"}}
{{broken"#
        )
        .unwrap();

        let result = ingest_file(&repo, file.path(), 2).await;
        assert!(result.is_success());
        assert_eq!(result.stats.created, 2);
        assert_eq!(result.stats.failed, 2);
        assert_eq!(repo.list_all(None).await.unwrap().len(), 2);

        let again = ingest_file(&repo, file.path(), 2).await;
        assert_eq!(again.stats.unchanged, 2);
        assert_eq!(again.stats.created, 0);
    }

    #[tokio::test]
    async fn test_ingest_files_reports_unreadable_file() {
        let repo = test_repo().await;
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.jsonl");
        std::fs::write(&good, "{\"url\": \"https://example.edu/a\", \"title\": \"Scrum\"}\n").unwrap();
        let missing = dir.path().join("missing.jsonl");

        let summary = ingest_files(&repo, &[good, missing], 4).await;
        assert_eq!(summary.successful_count(), 1);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.total_records(), 1);
        assert_eq!(summary.combined_stats().created, 1);
    }
}
