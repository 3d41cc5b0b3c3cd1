//! Catalogo DB - SQLite persistence for courses, the search index, and the vocabulary.

pub mod index;
pub mod pool;
pub mod repository;
pub mod schema;
pub mod search;
pub mod vocabulary;

pub use pool::connect;
pub use repository::CourseRepository;
pub use schema::init_schema;
pub use search::SearchService;
pub use vocabulary::VocabularyRepository;

#[cfg(test)]
pub(crate) mod testing {
    use catalogo_core::config::DbConfig;
    use catalogo_core::models::NewCourse;
    use sqlx::SqlitePool;

    /// Fresh in-memory database with the full schema.
    pub async fn test_pool() -> SqlitePool {
        let pool = crate::connect("sqlite::memory:", &DbConfig::default())
            .await
            .unwrap();
        crate::init_schema(&pool).await.unwrap();
        pool
    }

    pub fn course(url: &str, title: &str) -> NewCourse {
        let mut course = NewCourse::new(url, title);
        course.category = Some("Curso".to_string());
        course.description = Some(format!("Descripción de {}", title));
        course
    }
}
