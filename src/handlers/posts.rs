use axum::{
    Form,
    extract::{Multipart, Query, State},
    response::{Json, Redirect},
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::{AppError, Result},
    handlers::{parse_id, upload::read_multipart},
    models::{
        CreatePostRequest, Pagination, PostDetail, PostFilter, PostListResponse, SortOrder,
    },
    services::{comment_service, post_service, upload_service, user_service},
};

const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct GetPostsQuery {
    pub page: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FilterPostsQuery {
    pub category: Option<String>,
    pub sort: Option<String>,
    pub likes: Option<String>,
    pub page: Option<String>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ViewPostQuery {
    pub id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DeletePostRequest {
    pub post_id: String,
}

/// Malformed or out-of-range paging input falls back to the defaults.
fn parse_page(raw: Option<&str>) -> u32 {
    raw.and_then(|p| p.trim().parse::<u32>().ok())
        .filter(|&p| p >= 1)
        .unwrap_or(1)
}

fn parse_sort(raw: Option<&str>) -> SortOrder {
    raw.and_then(|s| s.trim().parse().ok()).unwrap_or_default()
}

async fn list_page(
    state: &AppState,
    viewer: &OptionalAuthUser,
    filter: PostFilter,
    page: u32,
    page_size: u32,
) -> Result<PostListResponse> {
    let total = post_service::get_posts_count(&state.db, filter.category.as_deref()).await?;
    let pagination = Pagination::new(page, page_size, total);
    let posts =
        post_service::get_posts(&state.db, &filter, pagination.page_size, pagination.offset())
            .await?;
    let categories = post_service::get_categories(&state.db).await?;

    Ok(PostListResponse {
        posts,
        pagination,
        filter,
        categories,
        authenticated: viewer.is_authenticated(),
        username: viewer.username(),
    })
}

pub async fn get_posts(
    State(state): State<AppState>,
    viewer: OptionalAuthUser,
    Query(query): Query<GetPostsQuery>,
) -> Result<Json<PostListResponse>> {
    let page = parse_page(query.page.as_deref());
    let response = list_page(
        &state,
        &viewer,
        PostFilter::default(),
        page,
        state.config.posts_per_page,
    )
    .await?;

    Ok(Json(response))
}

pub async fn filter_posts(
    State(state): State<AppState>,
    viewer: OptionalAuthUser,
    Query(query): Query<FilterPostsQuery>,
) -> Result<Json<PostListResponse>> {
    let filter = PostFilter {
        category: query
            .category
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
        sort: parse_sort(query.sort.as_deref()),
        likes: parse_sort(query.likes.as_deref()),
    };

    let page = parse_page(query.page.as_deref());
    let page_size = query
        .page_size
        .as_deref()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .filter(|&s| s >= 1)
        .unwrap_or(state.config.posts_per_page)
        .min(MAX_PAGE_SIZE);

    let response = list_page(&state, &viewer, filter, page, page_size).await?;
    Ok(Json(response))
}

pub async fn view_post(
    State(state): State<AppState>,
    viewer: OptionalAuthUser,
    Query(query): Query<ViewPostQuery>,
) -> Result<Json<PostDetail>> {
    let post_id = parse_id(&query.id, "post")?;

    let post = post_service::get_post_by_id(&state.db, post_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Post not found".to_string()))?;

    let replies = comment_service::get_post_comments(&state.db, post_id).await?;
    let images = upload_service::get_post_images(&state.db, post_id).await?;
    let users = user_service::list_usernames(&state.db).await?;

    let username = viewer.username();
    let same_user = username.as_deref() == Some(post.username.as_str());

    Ok(Json(PostDetail {
        post,
        replies,
        images,
        authenticated: viewer.is_authenticated(),
        username,
        same_user,
        users,
    }))
}

pub async fn create_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    multipart: Multipart,
) -> Result<Redirect> {
    let form = read_multipart(multipart).await?;

    let payload = CreatePostRequest {
        title: form.text("title").trim().to_string(),
        content: form.text("content").to_string(),
        category: form.text("category").trim().to_string(),
    };
    payload.validate()?;

    // Reject a bad image before anything is written
    if let Some(image) = &form.image {
        state
            .upload_service
            .validate_image(&image.filename, &image.data)?;
    }

    let post_id = post_service::create_post(&state.db, auth_user.user_id, &payload).await?;

    if let Some(image) = &form.image {
        state
            .upload_service
            .save_post_image(
                &state.db,
                post_id,
                auth_user.user_id,
                &image.filename,
                &image.data,
            )
            .await?;
    }

    Ok(Redirect::to("/post"))
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Form(payload): Form<DeletePostRequest>,
) -> Result<Redirect> {
    let post_id = parse_id(&payload.post_id, "post")?;
    post_service::delete_post(&state.db, auth_user.user_id, post_id).await?;
    Ok(Redirect::to("/post"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paging_input_falls_back_to_defaults() {
        assert_eq!(parse_page(None), 1);
        assert_eq!(parse_page(Some("3")), 3);
        assert_eq!(parse_page(Some("0")), 1);
        assert_eq!(parse_page(Some("-2")), 1);
        assert_eq!(parse_page(Some("abc")), 1);
    }

    #[test]
    fn sort_input_is_whitelisted() {
        assert_eq!(parse_sort(Some("asc")), SortOrder::Asc);
        assert_eq!(parse_sort(Some("created_at; --")), SortOrder::Desc);
        assert_eq!(parse_sort(None), SortOrder::Desc);
    }
}
