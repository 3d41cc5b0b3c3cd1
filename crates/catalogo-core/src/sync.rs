//! Re-crawl delta detection and ingest statistics.
//!
//! Pure bookkeeping, decoupled from the database writes and the CLI that
//! drives an ingest.

/// Outcome of ingesting a single crawled course.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Content hash matches the stored row - only the crawl time was refreshed
    Unchanged,
    /// Content changed - row overwritten and index entry replaced
    Updated,
    /// First crawl of this URL
    Created,
    /// The record could not be written
    Failed,
}

/// Statistics for one ingest run.
#[derive(Debug, Default, Clone)]
pub struct SyncStats {
    pub unchanged: usize,
    pub updated: usize,
    pub created: usize,
    pub failed: usize,
}

impl SyncStats {
    /// Creates a new empty stats tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an outcome, incrementing the appropriate counter.
    pub fn record(&mut self, outcome: SyncOutcome) {
        match outcome {
            SyncOutcome::Unchanged => self.unchanged += 1,
            SyncOutcome::Updated => self.updated += 1,
            SyncOutcome::Created => self.created += 1,
            SyncOutcome::Failed => self.failed += 1,
        }
    }

    /// Returns the total number of processed records.
    pub fn total(&self) -> usize {
        self.unchanged + self.updated + self.created + self.failed
    }

    /// Returns the number of successfully written records.
    pub fn successful(&self) -> usize {
        self.unchanged + self.updated + self.created
    }
}

/// Result of delta detection for a crawled course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReprocessingDecision {
    /// Whether the row and its index entry must be rewritten
    pub needs_rewrite: bool,
    /// The outcome classification for this record
    pub outcome: SyncOutcome,
    /// Human-readable reason for the decision
    pub reason: &'static str,
}

/// Determines if a crawled course needs rewriting based on content hash comparison.
///
/// # Arguments
/// * `existing_hash` - The stored hash for this URL (`None` if the URL is new)
/// * `new_hash` - The hash computed from the freshly crawled record
pub fn needs_reprocessing(
    existing_hash: Option<&Option<String>>,
    new_hash: &str,
) -> ReprocessingDecision {
    match existing_hash {
        Some(Some(hash)) if hash == new_hash => ReprocessingDecision {
            needs_rewrite: false,
            outcome: SyncOutcome::Unchanged,
            reason: "content hash matches",
        },
        Some(Some(_)) => ReprocessingDecision {
            needs_rewrite: true,
            outcome: SyncOutcome::Updated,
            reason: "content hash changed",
        },
        Some(None) => ReprocessingDecision {
            needs_rewrite: true,
            outcome: SyncOutcome::Updated,
            reason: "legacy row without hash",
        },
        None => ReprocessingDecision {
            needs_rewrite: true,
            outcome: SyncOutcome::Created,
            reason: "new course",
        },
    }
}

// =============================================================================
// Batch Ingest Types
// =============================================================================

/// Result of ingesting one crawler output file.
#[derive(Debug, Clone)]
pub struct FileIngestResult {
    /// Path of the JSON Lines file.
    pub source: String,
    /// Per-record statistics for this file.
    pub stats: SyncStats,
    /// Error message if the file could not be read at all, None otherwise.
    pub error: Option<String>,
}

impl FileIngestResult {
    /// Creates a result for a file that was read (individual records may still have failed).
    pub fn success(source: String, stats: SyncStats) -> Self {
        Self {
            source,
            stats,
            error: None,
        }
    }

    /// Creates a result for a file that could not be read.
    pub fn failure(source: String, error: String) -> Self {
        Self {
            source,
            stats: SyncStats::default(),
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Aggregated results from ingesting several files.
#[derive(Debug, Clone, Default)]
pub struct BatchIngestSummary {
    pub results: Vec<FileIngestResult>,
}

impl BatchIngestSummary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, result: FileIngestResult) {
        self.results.push(result);
    }

    /// Returns the count of files that were read.
    pub fn successful_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_success()).count()
    }

    /// Returns the count of files that could not be read.
    pub fn failed_count(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }

    /// Returns the total number of records across all files.
    pub fn total_records(&self) -> usize {
        self.results.iter().map(|r| r.stats.total()).sum()
    }

    /// Combined per-record statistics.
    pub fn combined_stats(&self) -> SyncStats {
        self.results.iter().fold(SyncStats::new(), |mut acc, r| {
            acc.unchanged += r.stats.unchanged;
            acc.updated += r.stats.updated;
            acc.created += r.stats.created;
            acc.failed += r.stats.failed;
            acc
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_stats_record() {
        let mut stats = SyncStats::new();
        stats.record(SyncOutcome::Unchanged);
        stats.record(SyncOutcome::Updated);
        stats.record(SyncOutcome::Created);
        stats.record(SyncOutcome::Created);
        stats.record(SyncOutcome::Failed);

        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.updated, 1);
        assert_eq!(stats.created, 2);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total(), 5);
        assert_eq!(stats.successful(), 4);
    }

    #[test]
    fn test_needs_reprocessing_unchanged() {
        let hash = "abc123".to_string();
        let existing = Some(Some(hash.clone()));
        let decision = needs_reprocessing(existing.as_ref(), &hash);

        assert!(!decision.needs_rewrite);
        assert_eq!(decision.outcome, SyncOutcome::Unchanged);
    }

    #[test]
    fn test_needs_reprocessing_updated() {
        let existing = Some(Some("abc123".to_string()));
        let decision = needs_reprocessing(existing.as_ref(), "def456");

        assert!(decision.needs_rewrite);
        assert_eq!(decision.outcome, SyncOutcome::Updated);
        assert_eq!(decision.reason, "content hash changed");
    }

    #[test]
    fn test_needs_reprocessing_legacy() {
        let existing: Option<Option<String>> = Some(None);
        let decision = needs_reprocessing(existing.as_ref(), "new_hash");

        assert!(decision.needs_rewrite);
        assert_eq!(decision.outcome, SyncOutcome::Updated);
        assert_eq!(decision.reason, "legacy row without hash");
    }

    #[test]
    fn test_needs_reprocessing_new() {
        let decision = needs_reprocessing(None, "new_hash");

        assert!(decision.needs_rewrite);
        assert_eq!(decision.outcome, SyncOutcome::Created);
        assert_eq!(decision.reason, "new course");
    }

    #[test]
    fn test_batch_ingest_summary_mixed_results() {
        let mut summary = BatchIngestSummary::new();
        summary.add(FileIngestResult::success(
            "a.jsonl".into(),
            SyncStats {
                unchanged: 10,
                updated: 5,
                created: 3,
                failed: 2,
            },
        ));
        summary.add(FileIngestResult::failure(
            "missing.jsonl".into(),
            "No such file or directory".into(),
        ));
        summary.add(FileIngestResult::success(
            "b.jsonl".into(),
            SyncStats {
                unchanged: 0,
                updated: 0,
                created: 4,
                failed: 0,
            },
        ));

        assert_eq!(summary.successful_count(), 2);
        assert_eq!(summary.failed_count(), 1);
        assert_eq!(summary.total_records(), 24);

        let combined = summary.combined_stats();
        assert_eq!(combined.created, 7);
        assert_eq!(combined.failed, 2);
    }

    #[test]
    fn test_batch_ingest_summary_empty() {
        let summary = BatchIngestSummary::new();
        assert_eq!(summary.successful_count(), 0);
        assert_eq!(summary.failed_count(), 0);
        assert_eq!(summary.total_records(), 0);
    }
}
