use axum::{extract::State, response::Json};
use serde_json::{Value, json};

use crate::{
    AppState,
    auth::{AuthUser, OptionalAuthUser},
    error::Result,
    models::UserProfile,
    services::{post_service, user_service},
};

pub async fn home(viewer: OptionalAuthUser) -> Json<Value> {
    Json(json!({
        "authenticated": viewer.is_authenticated(),
        "username": viewer.username(),
    }))
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<UserProfile>> {
    let profile = user_service::get_profile(&state.db, auth_user.user_id).await?;
    Ok(Json(profile))
}

pub async fn get_activity(
    State(state): State<AppState>,
    auth_user: AuthUser,
) -> Result<Json<Value>> {
    let my_posts = post_service::get_user_posts(&state.db, auth_user.user_id).await?;
    let liked_posts = post_service::get_liked_posts(&state.db, auth_user.user_id).await?;

    Ok(Json(json!({
        "my_posts": my_posts,
        "liked_posts": liked_posts,
    })))
}
