//! Storage accessor for the `videos` table.

use async_trait::async_trait;
use sqlx::PgPool;

use super::model::Video;

#[derive(thiserror::Error, Debug)]
pub enum StorageError {
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
}

/// Read access to stored videos.
///
/// Implementations must be safe to call concurrently; every call owns
/// whatever connection it borrows and gives it back before returning.
#[async_trait]
pub trait VideoStorage: Send + Sync {
    /// Returns every video whose title contains `title`, ignoring case.
    ///
    /// The order of the returned rows is whatever the database yields.
    async fn find_videos_by_title(&self, title: &str) -> Result<Vec<Video>, StorageError>;
}

#[derive(Clone, Debug)]
pub struct PgVideoStorage {
    db: PgPool,
}

impl PgVideoStorage {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

/// Wraps a term in `%` so ILIKE matches it anywhere in the title.
pub(crate) fn substring_pattern(title: &str) -> String {
    format!("%{}%", title)
}

#[async_trait]
impl VideoStorage for PgVideoStorage {
    #[tracing::instrument(name = "VideoService.Storage.FindVideosByTitle", skip(self))]
    async fn find_videos_by_title(&self, title: &str) -> Result<Vec<Video>, StorageError> {
        let videos = sqlx::query_as::<_, Video>(
            r#"SELECT id, title, description, number_of_views, number_of_likes, created_at
               FROM videos
               WHERE title ILIKE $1"#,
        )
        .bind(substring_pattern(title))
        .fetch_all(&self.db)
        .await?;

        tracing::debug!(rows = videos.len(), "Fetched videos by title");

        Ok(videos)
    }
}
