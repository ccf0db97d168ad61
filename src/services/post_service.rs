use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};

use crate::{
    error::{AppError, Result},
    models::{Category, CreatePostRequest, Post, PostFilter, PostLink, PostSummary},
};

const SUMMARY_SELECT: &str = r#"
    SELECT
        p.id, p.title, p.content, u.username, c.name AS category,
        p.likes_count, p.dislikes_count,
        (SELECT COUNT(*) FROM comments cm WHERE cm.post_id = p.id) AS replies_count,
        p.last_reply_at, p.last_reply_user, p.created_at
    FROM posts p
    JOIN users u ON p.user_id = u.id
    JOIN categories c ON p.category_id = c.id
"#;

pub async fn get_post_by_id_raw(db: &SqlitePool, post_id: i64) -> Result<Option<Post>> {
    let post = sqlx::query_as::<_, Post>("SELECT * FROM posts WHERE id = ?")
        .bind(post_id)
        .fetch_optional(db)
        .await?;

    Ok(post)
}

pub async fn get_post_by_id(db: &SqlitePool, post_id: i64) -> Result<Option<PostSummary>> {
    let sql = format!("{} WHERE p.id = ?", SUMMARY_SELECT);
    let post = sqlx::query_as::<_, PostSummary>(&sql)
        .bind(post_id)
        .fetch_optional(db)
        .await?;

    Ok(post)
}

/// One page of posts matching `filter`.
///
/// Sort directions come from the `SortOrder` enum, never from raw input, so
/// they are safe to splice into the ORDER BY clause.
pub async fn get_posts(
    db: &SqlitePool,
    filter: &PostFilter,
    limit: u32,
    offset: i64,
) -> Result<Vec<PostSummary>> {
    let sql = format!(
        r#"{}
        WHERE (? IS NULL OR c.name = ?)
        ORDER BY p.created_at {sort}, p.likes_count {likes}, p.id {sort}
        LIMIT ? OFFSET ?
        "#,
        SUMMARY_SELECT,
        sort = filter.sort.as_sql(),
        likes = filter.likes.as_sql(),
    );

    let posts = sqlx::query_as::<_, PostSummary>(&sql)
        .bind(filter.category.as_deref())
        .bind(filter.category.as_deref())
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(db)
        .await?;

    Ok(posts)
}

pub async fn get_posts_count(db: &SqlitePool, category: Option<&str>) -> Result<i64> {
    let count = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM posts p
        JOIN categories c ON p.category_id = c.id
        WHERE (? IS NULL OR c.name = ?)
        "#,
    )
    .bind(category)
    .bind(category)
    .fetch_one(db)
    .await?;

    Ok(count)
}

/// Returns the id of category `name`, creating it on first use.
pub async fn get_or_create_category(conn: &mut SqliteConnection, name: &str) -> Result<i64> {
    sqlx::query("INSERT INTO categories (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
        .bind(name)
        .execute(&mut *conn)
        .await?;

    let id = sqlx::query_scalar("SELECT id FROM categories WHERE name = ?")
        .bind(name)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

pub async fn get_categories(db: &SqlitePool) -> Result<Vec<Category>> {
    let categories = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
        .fetch_all(db)
        .await?;
    Ok(categories)
}

pub async fn create_post(db: &SqlitePool, user_id: i64, request: &CreatePostRequest) -> Result<i64> {
    let mut tx = db.begin().await?;

    let category_id = get_or_create_category(&mut tx, request.category.trim()).await?;

    let post_id = sqlx::query(
        r#"
        INSERT INTO posts (title, content, user_id, category_id, created_at)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(request.title.trim())
    .bind(&request.content)
    .bind(user_id)
    .bind(category_id)
    .bind(Utc::now())
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    tx.commit().await?;

    tracing::info!(post_id, user_id, "post created");
    Ok(post_id)
}

/// Deletes a post owned by `user_id`. Replies, votes and image records go
/// with it through the foreign keys.
pub async fn delete_post(db: &SqlitePool, user_id: i64, post_id: i64) -> Result<()> {
    let mut tx = db.begin().await?;

    let deleted = sqlx::query("DELETE FROM posts WHERE id = ? AND user_id = ?")
        .bind(post_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

    if deleted.rows_affected() == 0 {
        // Nothing was written; tell a missing post from someone else's
        let exists: Option<i64> = sqlx::query_scalar("SELECT id FROM posts WHERE id = ?")
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;

        return Err(match exists {
            None => AppError::NotFound("Post not found".to_string()),
            Some(_) => AppError::Authorization("You can only delete your own posts".to_string()),
        });
    }

    tx.commit().await?;

    tracing::info!(post_id, user_id, "post deleted");
    Ok(())
}

pub async fn get_user_posts(db: &SqlitePool, user_id: i64) -> Result<Vec<PostLink>> {
    let posts = sqlx::query_as::<_, PostLink>(
        r#"
        SELECT p.id, p.title, p.content, u.username
        FROM posts p JOIN users u ON p.user_id = u.id
        WHERE p.user_id = ?
        ORDER BY p.created_at DESC, p.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(posts)
}

/// Posts `user_id` currently likes (dislikes excluded).
pub async fn get_liked_posts(db: &SqlitePool, user_id: i64) -> Result<Vec<PostLink>> {
    let posts = sqlx::query_as::<_, PostLink>(
        r#"
        SELECT p.id, p.title, p.content, u.username
        FROM post_likes pl
        JOIN posts p ON pl.post_id = p.id
        JOIN users u ON p.user_id = u.id
        WHERE pl.user_id = ? AND pl.is_like = 1
        ORDER BY pl.id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;

    Ok(posts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{database, models::SortOrder};
    use tempfile::TempDir;

    async fn create_test_db() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let url = format!("sqlite://{}", temp_dir.path().join("test.db").display());
        let pool = database::create_pool(&url).await.unwrap();
        database::run_migrations(&pool).await.unwrap();
        (pool, temp_dir)
    }

    async fn insert_user(db: &SqlitePool, username: &str) -> i64 {
        sqlx::query(
            "INSERT INTO users (username, email, password_hash, created_at) VALUES (?, ?, 'x', ?)",
        )
        .bind(username)
        .bind(format!("{}@example.com", username))
        .bind(Utc::now())
        .execute(db)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    fn request(title: &str, category: &str) -> CreatePostRequest {
        CreatePostRequest {
            title: title.to_string(),
            content: format!("{} body", title),
            category: category.to_string(),
        }
    }

    #[tokio::test]
    async fn test_create_post_reuses_categories() {
        let (db, _temp) = create_test_db().await;
        let alice = insert_user(&db, "alice").await;

        let first = create_post(&db, alice, &request("Dune", "scifi")).await.unwrap();
        let second = create_post(&db, alice, &request("Hyperion", "scifi")).await.unwrap();

        let a = get_post_by_id_raw(&db, first).await.unwrap().unwrap();
        let b = get_post_by_id_raw(&db, second).await.unwrap().unwrap();
        assert_eq!(a.category_id, b.category_id);
        let categories = get_categories(&db).await.unwrap();
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].id, a.category_id);
        assert_eq!(categories[0].name, "scifi");

        let summary = get_post_by_id(&db, first).await.unwrap().unwrap();
        assert_eq!(summary.username, "alice");
        assert_eq!(summary.category, "scifi");
        assert_eq!((summary.likes_count, summary.dislikes_count), (0, 0));
        assert_eq!(summary.replies_count, 0);
    }

    #[tokio::test]
    async fn test_filter_and_order() {
        let (db, _temp) = create_test_db().await;
        let alice = insert_user(&db, "alice").await;

        let dune = create_post(&db, alice, &request("Dune", "scifi")).await.unwrap();
        let emma = create_post(&db, alice, &request("Emma", "classics")).await.unwrap();
        let solaris = create_post(&db, alice, &request("Solaris", "scifi")).await.unwrap();

        let newest_first = get_posts(&db, &PostFilter::default(), 10, 0).await.unwrap();
        let ids: Vec<i64> = newest_first.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![solaris, emma, dune]);

        let filter = PostFilter {
            category: Some("scifi".to_string()),
            sort: SortOrder::Asc,
            likes: SortOrder::Desc,
        };
        let scifi = get_posts(&db, &filter, 10, 0).await.unwrap();
        let ids: Vec<i64> = scifi.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![dune, solaris]);

        assert_eq!(get_posts_count(&db, None).await.unwrap(), 3);
        assert_eq!(get_posts_count(&db, Some("scifi")).await.unwrap(), 2);
        assert_eq!(get_posts_count(&db, Some("poetry")).await.unwrap(), 0);

        let second_page = get_posts(&db, &PostFilter::default(), 2, 2).await.unwrap();
        assert_eq!(second_page.len(), 1);
        assert_eq!(second_page[0].id, dune);
    }

    #[tokio::test]
    async fn test_only_owner_can_delete() {
        let (db, _temp) = create_test_db().await;
        let alice = insert_user(&db, "alice").await;
        let bob = insert_user(&db, "bob").await;

        let post_id = create_post(&db, alice, &request("Dune", "scifi")).await.unwrap();

        let err = delete_post(&db, bob, post_id).await.unwrap_err();
        assert!(matches!(err, AppError::Authorization(_)));
        assert!(get_post_by_id_raw(&db, post_id).await.unwrap().is_some());

        delete_post(&db, alice, post_id).await.unwrap();
        assert!(get_post_by_id_raw(&db, post_id).await.unwrap().is_none());

        let err = delete_post(&db, alice, post_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_deletes_race_with_new_posts() {
        let (db, _temp) = create_test_db().await;
        let alice = insert_user(&db, "alice").await;

        let mut doomed = Vec::new();
        for i in 0..8 {
            doomed.push(create_post(&db, alice, &request(&format!("Old {}", i), "scifi")).await.unwrap());
        }

        let deletes = doomed.iter().map(|&post_id| {
            let db = db.clone();
            tokio::spawn(async move { delete_post(&db, alice, post_id).await })
        });
        let creates = (0..8).map(|i| {
            let db = db.clone();
            tokio::spawn(async move {
                create_post(&db, alice, &request(&format!("New {}", i), "poetry"))
                    .await
                    .map(|_| ())
            })
        });

        let (deleted, created) = tokio::join!(
            futures::future::join_all(deletes),
            futures::future::join_all(creates)
        );
        for result in deleted.into_iter().chain(created) {
            result.unwrap().unwrap();
        }

        assert_eq!(get_posts_count(&db, Some("scifi")).await.unwrap(), 0);
        assert_eq!(get_posts_count(&db, Some("poetry")).await.unwrap(), 8);
    }
}
