use chrono::Utc;
use image::ImageFormat;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tokio::fs;
use uuid::Uuid;

use crate::{
    error::{AppError, Result},
    models::PostImage,
};

/// Public URL prefix the upload directory is served under.
pub const UPLOADS_ROUTE: &str = "/uploads";

#[derive(Debug, Clone)]
pub struct UploadService {
    upload_dir: PathBuf,
    max_file_size: usize,
}

impl UploadService {
    pub fn new(upload_dir: impl Into<PathBuf>, max_file_size: usize) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            max_file_size,
        }
    }

    /// Accepts only files whose name maps to an `image/*` type and whose
    /// bytes decode as a known image format.
    pub fn validate_image(&self, filename: &str, data: &[u8]) -> Result<ImageFormat> {
        if data.len() > self.max_file_size {
            return Err(AppError::ContentTooLarge);
        }
        if data.is_empty() {
            return Err(AppError::BadRequest("Uploaded file is empty".to_string()));
        }

        let guessed = mime_guess::from_path(filename).first();
        if !matches!(&guessed, Some(m) if m.type_() == mime::IMAGE) {
            tracing::debug!("Rejected upload {} with type {:?}", filename, guessed);
            return Err(AppError::UnsupportedMediaType);
        }

        image::guess_format(data).map_err(|_| AppError::UnsupportedMediaType)
    }

    /// Writes `data` under a collision-free name and returns its public path.
    pub async fn store_file(&self, filename: &str, data: &[u8]) -> Result<String> {
        fs::create_dir_all(&self.upload_dir).await?;

        let stored_name = format!("{}_{}", Uuid::new_v4(), sanitize_filename(filename));
        fs::write(self.upload_dir.join(&stored_name), data).await?;

        tracing::debug!("Stored upload {} ({} bytes)", stored_name, data.len());
        Ok(format!("{}/{}", UPLOADS_ROUTE, stored_name))
    }

    /// Validates, stores, and records an image attached to a post.
    pub async fn save_post_image(
        &self,
        db: &SqlitePool,
        post_id: i64,
        user_id: i64,
        filename: &str,
        data: &[u8],
    ) -> Result<PostImage> {
        self.validate_image(filename, data)?;

        let image_path = self.store_file(filename, data).await?;
        let image = PostImage {
            id: Uuid::new_v4().to_string(),
            post_id,
            user_id,
            image_path,
            created_at: Utc::now(),
        };

        let inserted = sqlx::query(
            r#"
            INSERT INTO post_images (id, post_id, user_id, image_path, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&image.id)
        .bind(image.post_id)
        .bind(image.user_id)
        .bind(&image.image_path)
        .bind(image.created_at)
        .execute(db)
        .await;

        if let Err(e) = inserted {
            self.remove_file(&image.image_path).await;
            return Err(e.into());
        }

        Ok(image)
    }

    async fn remove_file(&self, public_path: &str) {
        let Some(name) = public_path.rsplit('/').next() else {
            return;
        };
        if let Err(e) = fs::remove_file(self.upload_dir.join(name)).await {
            tracing::warn!("Failed to remove orphaned upload {}: {}", name, e);
        }
    }
}

pub async fn get_post_images(db: &SqlitePool, post_id: i64) -> Result<Vec<PostImage>> {
    let images = sqlx::query_as::<_, PostImage>(
        r#"
        SELECT id, post_id, user_id, image_path, created_at
        FROM post_images WHERE post_id = ?
        ORDER BY created_at ASC
        "#,
    )
    .bind(post_id)
    .fetch_all(db)
    .await?;
    Ok(images)
}

/// Keeps the final path component and replaces anything outside
/// `[A-Za-z0-9._-]`.
fn sanitize_filename(filename: &str) -> String {
    let base = filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim_start_matches('.');

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "upload".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("cover.png"), "cover.png");
        assert_eq!(sanitize_filename("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_filename("C:\\photos\\my cat.jpg"), "my_cat.jpg");
        assert_eq!(sanitize_filename(".hidden.png"), "hidden.png");
        assert_eq!(sanitize_filename("///"), "upload");
    }

    #[test]
    fn test_validate_image() {
        let service = UploadService::new("unused", 1024);

        assert_eq!(
            service.validate_image("cover.png", PNG_MAGIC).unwrap(),
            ImageFormat::Png
        );
        assert!(matches!(
            service.validate_image("notes.txt", PNG_MAGIC),
            Err(AppError::UnsupportedMediaType)
        ));
        assert!(matches!(
            service.validate_image("fake.png", b"just some text"),
            Err(AppError::UnsupportedMediaType)
        ));
        assert!(matches!(
            service.validate_image("empty.png", b""),
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            service.validate_image("big.png", &[0u8; 2048]),
            Err(AppError::ContentTooLarge)
        ));
    }

    #[tokio::test]
    async fn test_store_file() {
        let temp_dir = TempDir::new().unwrap();
        let service = UploadService::new(temp_dir.path().join("uploads"), 1024);

        let path = service.store_file("cover.png", PNG_MAGIC).await.unwrap();
        assert!(path.starts_with("/uploads/"));
        assert!(path.ends_with("_cover.png"));

        let name = path.rsplit('/').next().unwrap();
        let stored = std::fs::read(temp_dir.path().join("uploads").join(name)).unwrap();
        assert_eq!(stored, PNG_MAGIC);
    }
}
