use chrono::{Duration, Utc};
use rand::{Rng, distr::Alphanumeric};
use sqlx::SqlitePool;

use crate::{
    error::{AppError, Result},
    models::{PasswordResetToken, User},
    services::user_service,
};

const TOKEN_LENGTH: usize = 48;

/// Random URL-safe token for confirmation and reset links.
pub fn generate_token() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Issues a reset token for the account registered under `email`.
///
/// Returns `None` for unknown addresses; callers must respond the same way
/// in both cases so the endpoint does not reveal which emails exist.
pub async fn create_password_reset(
    db: &SqlitePool,
    email: &str,
    ttl_minutes: i64,
) -> Result<Option<(User, String)>> {
    let Some(user) = user_service::get_user_by_email(db, email).await? else {
        tracing::debug!("password reset requested for unknown email");
        return Ok(None);
    };

    let token = generate_token();
    let expires_at = Utc::now() + Duration::minutes(ttl_minutes);

    sqlx::query("INSERT INTO password_reset_tokens (token, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user.id)
        .bind(expires_at)
        .execute(db)
        .await?;

    tracing::info!(user_id = user.id, "password reset token issued");
    Ok(Some((user, token)))
}

/// Replaces the password of the account that owns `token`. The token is
/// consumed whether it is redeemed or found expired.
pub async fn reset_password(db: &SqlitePool, token: &str, password_hash: &str) -> Result<()> {
    let mut tx = db.begin().await?;

    // Consuming the token is the first write, so the rest of the
    // transaction holds the write lock
    let reset = sqlx::query_as::<_, PasswordResetToken>(
        "DELETE FROM password_reset_tokens WHERE token = ? RETURNING token, user_id, expires_at",
    )
    .bind(token)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::BadRequest("Invalid or expired token".to_string()))?;

    if reset.is_expired(Utc::now()) {
        tx.commit().await?;
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    }

    user_service::update_password(&mut tx, reset.user_id, password_hash).await?;

    tx.commit().await?;

    tracing::info!(user_id = reset.user_id, "password reset");
    Ok(())
}

/// Drops reset tokens whose expiry has passed.
pub async fn purge_expired_reset_tokens(db: &SqlitePool) -> Result<u64> {
    let purged = sqlx::query("DELETE FROM password_reset_tokens WHERE expires_at < ?")
        .bind(Utc::now())
        .execute(db)
        .await?
        .rows_affected();
    Ok(purged)
}
