use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PostImage {
    pub id: String,
    pub post_id: i64,
    pub user_id: i64,
    pub image_path: String,
    pub created_at: DateTime<Utc>,
}
