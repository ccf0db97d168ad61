use chrono::Utc;
use sqlx::SqlitePool;

use crate::{
    error::{AppError, Result},
    models::{Comment, CommentView},
    services::user_service,
};

pub async fn get_comment_by_id_raw(db: &SqlitePool, comment_id: i64) -> Result<Option<Comment>> {
    let comment = sqlx::query_as::<_, Comment>("SELECT * FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_optional(db)
        .await?;

    Ok(comment)
}

/// Adds a reply and stamps the post's last-reply fields in one transaction.
pub async fn create_reply(
    db: &SqlitePool,
    post_id: i64,
    user_id: i64,
    username: &str,
    content: &str,
    tagged_user: Option<&str>,
) -> Result<i64> {
    if let Some(tagged) = tagged_user {
        if user_service::get_user_by_username(db, tagged).await?.is_none() {
            return Err(AppError::BadRequest(format!("Unknown user {}", tagged)));
        }
    }

    let now = Utc::now();
    let mut tx = db.begin().await?;

    let touched = sqlx::query("UPDATE posts SET last_reply_at = ?, last_reply_user = ? WHERE id = ?")
        .bind(now)
        .bind(username)
        .bind(post_id)
        .execute(&mut *tx)
        .await?;

    if touched.rows_affected() == 0 {
        return Err(AppError::NotFound("Post not found".to_string()));
    }

    let comment_id = sqlx::query(
        r#"
        INSERT INTO comments (post_id, user_id, content, tagged_user, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(post_id)
    .bind(user_id)
    .bind(content)
    .bind(tagged_user)
    .bind(now)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    tracing::info!(comment_id, post_id, user_id, "reply added");
    Ok(comment_id)
}

/// Replies under a post, newest first.
pub async fn get_post_comments(db: &SqlitePool, post_id: i64) -> Result<Vec<CommentView>> {
    let comments = sqlx::query_as::<_, CommentView>(
        r#"
        SELECT cm.id, cm.content, u.username, cm.tagged_user, cm.created_at,
               cm.likes_count, cm.dislikes_count
        FROM comments cm
        JOIN users u ON cm.user_id = u.id
        WHERE cm.post_id = ?
        ORDER BY cm.created_at DESC, cm.id DESC
        "#,
    )
    .bind(post_id)
    .fetch_all(db)
    .await?;

    Ok(comments)
}
