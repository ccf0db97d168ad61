//! Like/dislike voting on posts and comments.
//!
//! This module is the only writer of the `likes_count` / `dislikes_count`
//! columns. Every change to a vote row and the matching counter adjustment
//! happen inside one transaction, so the counters always equal the number of
//! live vote rows of each polarity.

use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::{AppError, Result},
    models::{Vote, VoteCounts, VoteOutcome, VoteTarget},
};

fn counter_column(vote: Vote) -> &'static str {
    match vote {
        Vote::Like => "likes_count",
        Vote::Dislike => "dislikes_count",
    }
}

fn not_found(target: VoteTarget) -> AppError {
    match target {
        VoteTarget::Post(id) => AppError::NotFound(format!("Post {} not found", id)),
        VoteTarget::Comment(id) => AppError::NotFound(format!("Comment {} not found", id)),
    }
}

/// Records `vote` by `user_id` on `target` and returns the target's counters
/// after the change.
///
/// Re-casting the vote the user already has is a no-op. Casting the opposite
/// polarity flips the stored row and moves one unit between the counters.
pub async fn cast_vote(
    db: &SqlitePool,
    user_id: i64,
    target: VoteTarget,
    vote: Vote,
) -> Result<(VoteOutcome, VoteCounts)> {
    // Dropping `tx` on any early return rolls the whole cast back.
    let mut tx = db.begin().await?;

    // First statement is a write: it takes the database write lock, so the
    // read below cannot race another cast on the same target.
    lock_target(&mut tx, target).await?;

    let existing = existing_vote(&mut tx, user_id, target).await?;

    let outcome = match existing {
        None => {
            insert_vote(&mut tx, user_id, target, vote).await?;
            adjust_counter(&mut tx, target, vote, 1).await?;
            VoteOutcome::Inserted
        }
        Some(current) if current == vote => VoteOutcome::Unchanged,
        Some(current) => {
            update_vote(&mut tx, user_id, target, vote).await?;
            adjust_counter(&mut tx, target, vote, 1).await?;
            adjust_counter(&mut tx, target, current, -1).await?;
            VoteOutcome::Flipped
        }
    };

    let counts = stored_counts(&mut tx, target)
        .await?
        .ok_or_else(|| not_found(target))?;

    tx.commit().await?;

    tracing::debug!(
        user_id,
        ?target,
        ?vote,
        ?outcome,
        likes = counts.likes,
        dislikes = counts.dislikes,
        "vote cast"
    );

    Ok((outcome, counts))
}

async fn lock_target(conn: &mut SqliteConnection, target: VoteTarget) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET likes_count = likes_count WHERE id = ?",
        target.target_table()
    );
    let touched = sqlx::query(&sql)
        .bind(target.id())
        .execute(&mut *conn)
        .await?;

    if touched.rows_affected() == 0 {
        return Err(not_found(target));
    }
    Ok(())
}

async fn existing_vote(
    conn: &mut SqliteConnection,
    user_id: i64,
    target: VoteTarget,
) -> Result<Option<Vote>> {
    let sql = format!(
        "SELECT is_like FROM {} WHERE user_id = ? AND {} = ?",
        target.vote_table(),
        target.vote_column()
    );
    let is_like: Option<bool> = sqlx::query_scalar(&sql)
        .bind(user_id)
        .bind(target.id())
        .fetch_optional(&mut *conn)
        .await?;

    Ok(is_like.map(Vote::from_is_like))
}

async fn insert_vote(
    conn: &mut SqliteConnection,
    user_id: i64,
    target: VoteTarget,
    vote: Vote,
) -> Result<()> {
    let sql = format!(
        "INSERT INTO {} (user_id, {}, is_like) VALUES (?, ?, ?)",
        target.vote_table(),
        target.vote_column()
    );
    sqlx::query(&sql)
        .bind(user_id)
        .bind(target.id())
        .bind(vote.is_like())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn update_vote(
    conn: &mut SqliteConnection,
    user_id: i64,
    target: VoteTarget,
    vote: Vote,
) -> Result<()> {
    let sql = format!(
        "UPDATE {} SET is_like = ? WHERE user_id = ? AND {} = ?",
        target.vote_table(),
        target.vote_column()
    );
    sqlx::query(&sql)
        .bind(vote.is_like())
        .bind(user_id)
        .bind(target.id())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn adjust_counter(
    conn: &mut SqliteConnection,
    target: VoteTarget,
    vote: Vote,
    delta: i64,
) -> Result<()> {
    let column = counter_column(vote);
    let sql = format!(
        "UPDATE {} SET {} = {} + ? WHERE id = ?",
        target.target_table(),
        column,
        column
    );
    sqlx::query(&sql)
        .bind(delta)
        .bind(target.id())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn stored_counts(
    conn: &mut SqliteConnection,
    target: VoteTarget,
) -> Result<Option<VoteCounts>> {
    let sql = format!(
        "SELECT likes_count AS likes, dislikes_count AS dislikes FROM {} WHERE id = ?",
        target.target_table()
    );
    let counts = sqlx::query_as::<_, VoteCounts>(&sql)
        .bind(target.id())
        .fetch_optional(&mut *conn)
        .await?;
    Ok(counts)
}

/// Removes every vote cast by `user_id` and takes them back out of the
/// counters. Runs on the caller's transaction; used before an account is
/// deleted so the cascade cannot leave counters behind.
///
/// Returns the number of vote rows removed.
pub async fn retract_user_votes(conn: &mut SqliteConnection, user_id: i64) -> Result<u64> {
    let mut removed = 0;

    for target in [VoteTarget::Post(0), VoteTarget::Comment(0)] {
        let table = target.target_table();
        let votes = target.vote_table();
        let column = target.vote_column();

        let sql = format!(
            r#"
            UPDATE {table} SET
                likes_count = likes_count - (
                    SELECT COUNT(*) FROM {votes} v
                    WHERE v.{column} = {table}.id AND v.user_id = ? AND v.is_like = 1
                ),
                dislikes_count = dislikes_count - (
                    SELECT COUNT(*) FROM {votes} v
                    WHERE v.{column} = {table}.id AND v.user_id = ? AND v.is_like = 0
                )
            WHERE id IN (SELECT {column} FROM {votes} WHERE user_id = ?)
            "#
        );
        sqlx::query(&sql)
            .bind(user_id)
            .bind(user_id)
            .bind(user_id)
            .execute(&mut *conn)
            .await?;

        let sql = format!("DELETE FROM {votes} WHERE user_id = ?");
        removed += sqlx::query(&sql)
            .bind(user_id)
            .execute(&mut *conn)
            .await?
            .rows_affected();
    }

    tracing::debug!(user_id, removed, "retracted votes");
    Ok(removed)
}

/// Counters as stored on the target row.
pub async fn get_counts(db: &SqlitePool, target: VoteTarget) -> Result<Option<VoteCounts>> {
    let mut conn = db.acquire().await?;
    stored_counts(&mut conn, target).await
}

/// Counters recomputed from the vote rows. Diagnostic only; reads never use it.
pub async fn recount(db: &SqlitePool, target: VoteTarget) -> Result<VoteCounts> {
    let sql = format!(
        r#"
        SELECT
            COALESCE(SUM(CASE WHEN is_like = 1 THEN 1 ELSE 0 END), 0) AS likes,
            COALESCE(SUM(CASE WHEN is_like = 0 THEN 1 ELSE 0 END), 0) AS dislikes
        FROM {} WHERE {} = ?
        "#,
        target.vote_table(),
        target.vote_column()
    );
    let counts = sqlx::query_as::<_, VoteCounts>(&sql)
        .bind(target.id())
        .fetch_one(db)
        .await?;
    Ok(counts)
}

/// The vote `user_id` currently holds on `target`, if any.
pub async fn get_user_vote(
    db: &SqlitePool,
    user_id: i64,
    target: VoteTarget,
) -> Result<Option<Vote>> {
    let mut conn = db.acquire().await?;
    existing_vote(&mut conn, user_id, target).await
}
