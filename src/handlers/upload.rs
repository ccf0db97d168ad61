use axum::{
    body::Bytes,
    extract::{Multipart, State, multipart::MultipartError},
    http::StatusCode,
    response::Redirect,
};
use std::collections::HashMap;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    handlers::parse_id,
    services::post_service,
};

/// Name of the multipart part carrying an image.
const IMAGE_FIELD: &str = "image";

#[derive(Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Bytes,
}

/// Text parts by name plus the optional image part.
#[derive(Debug, Default)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub image: Option<UploadedFile>,
}

impl MultipartForm {
    pub fn text(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or_default()
    }
}

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::ContentTooLarge
    } else {
        AppError::BadRequest(e.body_text())
    }
}

pub async fn read_multipart(mut multipart: Multipart) -> Result<MultipartForm> {
    let mut form = MultipartForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();

        if name == IMAGE_FIELD {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field.bytes().await.map_err(multipart_error)?;
            // Browsers send an empty part when no file was chosen
            if !filename.is_empty() || !data.is_empty() {
                form.image = Some(UploadedFile { filename, data });
            }
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }
    }

    Ok(form)
}

pub async fn upload_post_image(
    State(state): State<AppState>,
    auth_user: AuthUser,
    multipart: Multipart,
) -> Result<Redirect> {
    let form = read_multipart(multipart).await?;
    let post_id = parse_id(form.text("post_id"), "post")?;

    let image = form
        .image
        .ok_or_else(|| AppError::BadRequest("No image uploaded".to_string()))?;

    let post = post_service::get_post_by_id_raw(&state.db, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    if post.user_id != auth_user.user_id {
        return Err(AppError::Authorization(
            "You can only add images to your own posts".to_string(),
        ));
    }

    let stored = state
        .upload_service
        .save_post_image(
            &state.db,
            post_id,
            auth_user.user_id,
            &image.filename,
            &image.data,
        )
        .await?;

    tracing::info!(post_id, image_id = %stored.id, "image attached");
    Ok(Redirect::to(&format!("/post/view?id={}", post_id)))
}
