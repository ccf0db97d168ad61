use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::{AppError, Result},
    models::{User, UserProfile},
    services::vote_service,
};

const USER_COLUMNS: &str = "id, username, email, password_hash, confirmed, confirm_token, created_at";

pub async fn get_user_by_id(db: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn get_user_by_email(db: &SqlitePool, email: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(email)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

pub async fn get_user_by_username(db: &SqlitePool, username: &str) -> Result<Option<User>> {
    let sql = format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS);
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(username)
        .fetch_optional(db)
        .await?;
    Ok(user)
}

/// Inserts a new, unconfirmed account.
///
/// Fails with `Conflict` when the username or email is taken, including when
/// a concurrent registration wins the race to the unique index.
pub async fn create_user(
    db: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
    confirm_token: &str,
) -> Result<User> {
    if get_user_by_username(db, username).await?.is_some() {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }
    if get_user_by_email(db, email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    let result = sqlx::query(
        r#"
        INSERT INTO users (username, email, password_hash, confirmed, confirm_token, created_at)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(confirm_token)
    .bind(Utc::now())
    .execute(db)
    .await;

    let user_id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            return Err(AppError::Conflict(
                "Username or email already registered".to_string(),
            ));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::info!(user_id, username, "user registered");

    get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::Internal("Registered user vanished".to_string()))
}

/// Marks the account holding `token` as confirmed. The token is cleared so it
/// works once.
pub async fn confirm_email(db: &SqlitePool, token: &str) -> Result<User> {
    let invalid = || AppError::BadRequest("Invalid or already used confirmation token".to_string());

    if token.is_empty() {
        return Err(invalid());
    }

    // One statement: the lookup happens under the write lock
    let sql = format!(
        "UPDATE users SET confirmed = 1, confirm_token = NULL WHERE confirm_token = ? RETURNING {}",
        USER_COLUMNS
    );
    let user = sqlx::query_as::<_, User>(&sql)
        .bind(token)
        .fetch_optional(db)
        .await?
        .ok_or_else(invalid)?;

    tracing::info!(user_id = user.id, "email confirmed");
    Ok(user)
}

pub async fn update_password(
    conn: &mut SqliteConnection,
    user_id: i64,
    password_hash: &str,
) -> Result<()> {
    sqlx::query("UPDATE users SET password_hash = ? WHERE id = ?")
        .bind(password_hash)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn get_profile(db: &SqlitePool, user_id: i64) -> Result<UserProfile> {
    let user = get_user_by_id(db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    let num_posts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM posts WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    let num_comments: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM comments WHERE user_id = ?")
        .bind(user_id)
        .fetch_one(db)
        .await?;

    // Votes cast by the user on posts.
    let (num_likes, num_dislikes): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN is_like = 1 THEN 1 ELSE 0 END), 0),
            COALESCE(SUM(CASE WHEN is_like = 0 THEN 1 ELSE 0 END), 0)
        FROM post_likes WHERE user_id = ?
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;

    Ok(UserProfile {
        username: user.username,
        email: user.email,
        confirmed: user.confirmed,
        num_posts,
        num_comments,
        num_likes,
        num_dislikes,
    })
}

/// Usernames offered for tagging in replies.
pub async fn list_usernames(db: &SqlitePool) -> Result<Vec<String>> {
    let usernames = sqlx::query_scalar("SELECT username FROM users ORDER BY username")
        .fetch_all(db)
        .await?;
    Ok(usernames)
}

/// Deletes the account and everything it owns. Votes are retracted first so
/// counters on surviving posts and comments stay in step.
pub async fn delete_account(db: &SqlitePool, user_id: i64) -> Result<()> {
    let mut tx = db.begin().await?;

    vote_service::retract_user_votes(&mut tx, user_id).await?;

    let deleted = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if deleted.rows_affected() == 0 {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    tx.commit().await?;

    tracing::info!(user_id, "account deleted");
    Ok(())
}
