use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use crate::models::{CommentView, PostImage};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub user_id: i64,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub last_reply_at: Option<DateTime<Utc>>,
    pub last_reply_user: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

// Create post form (multipart text fields)
#[derive(Debug, Default, Validate, Deserialize)]
pub struct CreatePostRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be 1-200 characters"))]
    pub title: String,
    #[validate(length(min = 1, message = "Content is required"))]
    pub content: String,
    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    pub category: String,
}

// Row used on list pages
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostSummary {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub username: String,
    pub category: String,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub replies_count: i64,
    pub last_reply_at: Option<DateTime<Utc>>,
    pub last_reply_user: Option<String>,
    pub created_at: DateTime<Utc>,
}

// Single post page
#[derive(Debug, Serialize)]
pub struct PostDetail {
    pub post: PostSummary,
    pub replies: Vec<CommentView>,
    pub images: Vec<PostImage>,
    pub authenticated: bool,
    pub username: Option<String>,
    pub same_user: bool,
    pub users: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" | "ASC" => Ok(SortOrder::Asc),
            "desc" | "DESC" => Ok(SortOrder::Desc),
            _ => Err(format!("Unknown SortOrder: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct PostFilter {
    pub category: Option<String>,
    pub sort: SortOrder,
    pub likes: SortOrder,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub total: i64,
}

impl Pagination {
    pub fn new(current_page: u32, page_size: u32, total: i64) -> Self {
        let page_size = page_size.max(1);
        let total_pages = ((total.max(0) as u64 + page_size as u64 - 1) / page_size as u64) as u32;
        Self {
            current_page,
            total_pages,
            page_size,
            total,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.current_page.saturating_sub(1) as i64) * self.page_size as i64
    }
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub posts: Vec<PostSummary>,
    pub pagination: Pagination,
    pub filter: PostFilter,
    pub categories: Vec<Category>,
    pub authenticated: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PostLink {
    pub id: i64,
    pub title: String,
    pub content: String,
    pub username: String,
}
