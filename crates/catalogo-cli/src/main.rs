use anyhow::{anyhow, bail, Context};
use clap::Parser;
use dotenvy::dotenv;
use sqlx::SqlitePool;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use catalogo_cli::ingest::ingest_files;
use catalogo_cli::output::{create_export_record, csv_line, truncate_text, CSV_HEADER};
use catalogo_cli::{Command, CompareTarget, Config, CourseRef, ExportFormat, TermsCommand};
use catalogo_core::config::{load_config, load_vocabulary_file, AppConfig, SearchConfig};
use catalogo_core::error::AppError;
use catalogo_core::models::{Course, SearchPath};
use catalogo_core::similarity::compare_texts;
use catalogo_db::{connect, index, init_schema, CourseRepository, SearchService, VocabularyRepository};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv().ok();

    // Parse command line arguments
    let config = Config::parse();

    // Setup logging (stderr to keep stdout clean for exports)
    let level = if config.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install log subscriber")?;

    let settings = load_config(config.config.as_deref()).context("Failed to load configuration")?;

    // Database connection
    info!("Connecting to database...");
    let pool = connect(&config.database_url, &settings.database)
        .await
        .context("Failed to connect to database")?;

    // Execute command
    match config.command {
        Command::Init => {
            init_schema(&pool)
                .await
                .context("Failed to create schema")?;
            println!("Initialized catalog at {}", config.database_url);
        }
        Command::Ingest { files, concurrency } => {
            let concurrency = concurrency.unwrap_or(settings.ingest.concurrency);
            ingest(&pool, &files, concurrency).await?;
        }
        Command::Search {
            query,
            limit,
            fallback,
        } => {
            let search_config = search_settings(&settings, limit, fallback)?;
            search(pool, search_config, &query).await?;
        }
        Command::Delete { course_id } => {
            delete(&pool, course_id).await?;
        }
        Command::Terms { action } => {
            terms(&pool, action).await?;
        }
        Command::Export { format, limit } => {
            export(&pool, format, limit).await?;
        }
        Command::Stats => {
            show_stats(&pool).await?;
        }
        Command::Reindex => {
            let entries = index::rebuild(&pool)
                .await
                .context("Failed to rebuild search index")?;
            println!("Search index rebuilt: {} entries", entries);
        }
        Command::Compare { target } => {
            compare(&pool, &target).await?;
        }
    }

    Ok(())
}

/// Merge CLI overrides into the configured search settings
fn search_settings(
    settings: &AppConfig,
    limit: Option<usize>,
    fallback: bool,
) -> anyhow::Result<SearchConfig> {
    let mut search_config = settings.search.clone();
    if let Some(limit) = limit {
        if limit == 0 {
            bail!("--limit must be at least 1");
        }
        search_config.limit = limit;
    }
    if fallback {
        search_config.force_fallback = true;
    }
    Ok(search_config)
}

/// Ingest crawler output files into the catalog
async fn ingest(
    pool: &SqlitePool,
    files: &[std::path::PathBuf],
    concurrency: usize,
) -> anyhow::Result<()> {
    if concurrency == 0 {
        bail!("--concurrency must be at least 1");
    }
    let repo = CourseRepository::new(pool.clone());

    info!("Ingesting {} file(s), {} writes at a time", files.len(), concurrency);
    let summary = ingest_files(&repo, files, concurrency).await;
    let stats = summary.combined_stats();

    println!("\n📥 Ingest Summary\n");
    for result in &summary.results {
        match &result.error {
            None => println!(
                "  ✓ {} ({} records, {} failed)",
                result.source,
                result.stats.total(),
                result.stats.failed
            ),
            Some(e) => println!("  ✗ {}: {}", result.source, e),
        }
    }
    println!();
    println!("  Created:               {}", stats.created);
    println!("  Updated:               {}", stats.updated);
    println!("  Unchanged:             {}", stats.unchanged);
    println!("  Failed:                {}", stats.failed);
    println!();

    info!(
        "Ingest complete: {} of {} files read, {} of {} records written",
        summary.successful_count(),
        summary.results.len(),
        stats.successful(),
        summary.total_records()
    );
    Ok(())
}

/// Search courses through the expanded vocabulary
async fn search(pool: SqlitePool, search_config: SearchConfig, query: &str) -> anyhow::Result<()> {
    info!("Searching for: '{}' (limit: {})", query, search_config.limit);

    let service = SearchService::new(pool, search_config);
    let response = service
        .search_interests(query)
        .await
        .map_err(|e| anyhow!(e.user_message()))?;

    if response.is_empty() {
        println!("\n🔍 No results found for: \"{}\"\n", query);
        println!("Expanded query: {}", response.expression);
        println!("\nTry:");
        println!("  • Using different keywords");
        println!("  • Adding synonyms with: catalogo terms add <term> <synonym>...");
        println!("  • Ingesting more crawler output with: catalogo ingest <file>");
        return Ok(());
    }

    println!("\n🔍 Search Results for: \"{}\"\n", query);
    println!("Expanded query: {}", response.expression);
    match response.path {
        SearchPath::Index => println!("Found {} matching courses:\n", response.hits.len()),
        SearchPath::FallbackScan => println!(
            "Found {} matching courses (index unavailable, ordered by id):\n",
            response.hits.len()
        ),
    }

    for (i, hit) in response.hits.iter().enumerate() {
        match hit.score {
            Some(score) => println!("{}. {}  (score={:.3})", i + 1, hit.course.title, score),
            None => println!("{}. {}", i + 1, hit.course.title),
        }
        println!("   🔗 {}", hit.course.url);
        let details: Vec<&str> = [
            hit.course.category.as_deref(),
            hit.course.modality.as_deref(),
            hit.course.duration.as_deref(),
            hit.course.start_date.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !details.is_empty() {
            println!("   📍 {}", details.join(" · "));
        }
        if let Some(desc) = &hit.course.description {
            println!("   📝 {}", truncate_text(desc, 120));
        }
        println!();
    }

    Ok(())
}

/// Delete a course by id
async fn delete(pool: &SqlitePool, course_id: i64) -> anyhow::Result<()> {
    let repo = CourseRepository::new(pool.clone());
    if !repo.delete(course_id).await? {
        return Err(AppError::CourseNotFound(course_id.to_string()).into());
    }
    println!("Deleted course {}", course_id);
    Ok(())
}

/// Vocabulary curation
async fn terms(pool: &SqlitePool, action: TermsCommand) -> anyhow::Result<()> {
    let vocabulary = VocabularyRepository::new(pool.clone());
    match action {
        TermsCommand::List => {
            let entries = vocabulary.list_terms().await?;
            if entries.is_empty() {
                println!("No terms registered.");
            }
            for entry in entries {
                if entry.synonyms.is_empty() {
                    println!("{}", entry.term);
                } else {
                    println!("{}: {}", entry.term, entry.synonyms.join(", "));
                }
            }
        }
        TermsCommand::Add { term, synonyms } => {
            vocabulary.add_term_with_synonyms(&term, &synonyms).await?;
            println!("Registered '{}' with {} synonym(s)", term.trim(), synonyms.len());
        }
        TermsCommand::RemoveSynonym { term, synonym } => {
            if vocabulary.remove_synonym(&term, &synonym).await? {
                println!("Removed synonym '{}' from '{}'", synonym.trim(), term.trim());
            } else {
                println!("'{}' is not a synonym of '{}'", synonym.trim(), term.trim());
            }
        }
        TermsCommand::Delete { term } => {
            vocabulary.delete_term(&term).await?;
            println!("Deleted term '{}' and its synonyms", term.trim());
        }
        TermsCommand::Import { file } => {
            let vocabulary_file = load_vocabulary_file(&file)
                .with_context(|| format!("Failed to read vocabulary file {}", file.display()))?;
            let (terms, added) = vocabulary.import(&vocabulary_file).await?;
            println!("Imported {} term(s), {} new synonym(s)", terms, added);
        }
    }
    Ok(())
}

/// Show database statistics
async fn show_stats(pool: &SqlitePool) -> anyhow::Result<()> {
    let stats = CourseRepository::new(pool.clone()).get_stats().await?;

    println!("\n📊 Database Statistics\n");
    println!("  Total courses:         {}", stats.total_courses);
    match stats.indexed_entries {
        Some(entries) => println!("  Index entries:         {}", entries),
        None => println!("  Index entries:         unavailable (run `catalogo reindex`)"),
    }
    println!("  Terms:                 {}", stats.total_terms);
    println!("  Synonyms:              {}", stats.total_synonyms);
    if let Some(last_crawl) = stats.last_crawl {
        println!("  Last crawl:            {}", last_crawl);
    }
    println!();

    Ok(())
}

/// Export courses to various formats
async fn export(pool: &SqlitePool, format: ExportFormat, limit: Option<usize>) -> anyhow::Result<()> {
    info!("Exporting courses...");

    let courses = CourseRepository::new(pool.clone()).list_all(limit).await?;

    if courses.is_empty() {
        eprintln!("No courses found to export.");
        return Ok(());
    }

    info!("Found {} courses to export", courses.len());

    match format {
        ExportFormat::Jsonl => {
            export_jsonl(&courses)?;
        }
        ExportFormat::Json => {
            export_json(&courses)?;
        }
        ExportFormat::Csv => {
            export_csv(&courses);
        }
    }

    info!("Export complete: {} courses", courses.len());
    Ok(())
}

/// Export courses in JSON Lines format (one JSON object per line)
fn export_jsonl(courses: &[Course]) -> anyhow::Result<()> {
    for course in courses {
        let json = serde_json::to_string(&create_export_record(course))?;
        println!("{}", json);
    }
    Ok(())
}

/// Export courses as a JSON array
fn export_json(courses: &[Course]) -> anyhow::Result<()> {
    let export_records: Vec<_> = courses.iter().map(create_export_record).collect();
    let json = serde_json::to_string_pretty(&export_records)?;
    println!("{}", json);
    Ok(())
}

/// Export courses in CSV format
fn export_csv(courses: &[Course]) {
    println!("{}", CSV_HEADER);
    for course in courses {
        println!("{}", csv_line(course));
    }
}

/// Resolve one course reference
async fn resolve(repo: &CourseRepository, course_ref: &CourseRef) -> anyhow::Result<Course> {
    let found = match course_ref {
        CourseRef::Id(id) => repo.get(*id).await?,
        CourseRef::Url(url) => repo.get_by_url(url).await?,
        CourseRef::TitleContains(fragment) => repo.find_first_by_title(fragment).await?,
    };
    let label = match course_ref {
        CourseRef::Id(id) => id.to_string(),
        CourseRef::Url(url) => url.clone(),
        CourseRef::TitleContains(fragment) => format!("title containing '{}'", fragment),
    };
    found.ok_or_else(|| AppError::CourseNotFound(label).into())
}

/// Compare two courses by TF-IDF cosine similarity
async fn compare(pool: &SqlitePool, target: &CompareTarget) -> anyhow::Result<()> {
    let (a, b) = target
        .refs()
        .context("Specify one of --ids, --urls or --titles")?;
    let repo = CourseRepository::new(pool.clone());
    let course_a = resolve(&repo, &a).await?;
    let course_b = resolve(&repo, &b).await?;

    let similarity = compare_texts(&course_a.similarity_text(), &course_b.similarity_text());

    println!("A: [{}] {}", course_a.course_id, course_a.title);
    println!("B: [{}] {}", course_b.course_id, course_b.title);
    println!("Similarity (cosine) = {:.4}", similarity);
    Ok(())
}
