use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Read-only projection of a row in the `videos` table.
#[derive(Serialize, Deserialize, FromRow, Debug, Clone, PartialEq, Eq)]
pub struct Video {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub number_of_views: i64,
    pub number_of_likes: i64,
    pub created_at: DateTime<Utc>,
}
