//! Rendering helpers for terminal output and exports.

use catalogo_core::models::Course;

/// CSV header matching [`csv_line`].
pub const CSV_HEADER: &str = "course_id,url,title,category,modality,duration,price,start_date,location,description,last_crawled_at";

/// Create an export record without the raw HTML (too large for export)
pub fn create_export_record(course: &Course) -> serde_json::Value {
    serde_json::json!({
        "course_id": course.course_id,
        "url": course.url,
        "title": course.title,
        "category": course.category,
        "modality": course.modality,
        "duration": course.duration,
        "price": course.price,
        "start_date": course.start_date,
        "location": course.location,
        "value_proposal": course.value_proposal,
        "tutoria": course.tutoria,
        "description": course.description,
        "last_crawled_at": course.last_crawled_at
    })
}

/// One CSV row for a course.
pub fn csv_line(course: &Course) -> String {
    let optional = |value: &Option<String>| value.as_deref().map(escape_csv).unwrap_or_default();
    format!(
        "{},{},{},{},{},{},{},{},{},{},{}",
        course.course_id,
        escape_csv(&course.url),
        escape_csv(&course.title),
        optional(&course.category),
        optional(&course.modality),
        optional(&course.duration),
        optional(&course.price),
        optional(&course.start_date),
        optional(&course.location),
        optional(&course.description),
        course.last_crawled_at.format("%Y-%m-%dT%H:%M:%SZ"),
    )
}

/// Escape a string for CSV output
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Truncate text to a maximum number of characters, adding ellipsis if needed
pub fn truncate_text(text: &str, max_len: usize) -> String {
    let cleaned = text.split_whitespace().collect::<Vec<_>>().join(" ");

    if cleaned.chars().count() <= max_len {
        cleaned
    } else {
        let cut: String = cleaned.chars().take(max_len).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn sample() -> Course {
        Course {
            course_id: 7,
            url: "https://example.edu/ia".to_string(),
            title: "IA, datos y \"Python\"".to_string(),
            category: Some("Curso".to_string()),
            modality: Some("Online".to_string()),
            duration: None,
            price: None,
            start_date: None,
            location: None,
            value_proposal: None,
            tutoria: None,
            description: Some("Línea 1\nLínea 2".to_string()),
            raw_html: Some("<html></html>".to_string()),
            last_crawled_at: Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
            content_hash: None,
        }
    }

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_csv_line() {
        assert_eq!(
            csv_line(&sample()),
            "7,https://example.edu/ia,\"IA, datos y \"\"Python\"\"\",Curso,Online,,,,,\"Línea 1\nLínea 2\",2025-03-01T12:00:00Z"
        );
        assert_eq!(CSV_HEADER.split(',').count(), 11);
    }

    #[test]
    fn test_export_record_omits_raw_html() {
        let record = create_export_record(&sample());
        assert_eq!(record["course_id"], 7);
        assert!(record.get("raw_html").is_none());
        assert!(record.get("content_hash").is_none());
    }

    #[test]
    fn test_truncate_text_counts_characters() {
        assert_eq!(truncate_text("  corto \n texto ", 20), "corto texto");
        assert_eq!(truncate_text("programación básica", 11), "programació...");
    }
}
