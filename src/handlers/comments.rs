use axum::{
    Form,
    extract::State,
    response::Redirect,
};
use validator::Validate;

use crate::{
    AppState,
    auth::AuthUser,
    error::Result,
    handlers::parse_id,
    models::CreateCommentRequest,
    services::comment_service,
};

pub async fn create_reply(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Form(payload): Form<CreateCommentRequest>,
) -> Result<Redirect> {
    let post_id = parse_id(&payload.post_id, "post")?;
    payload.validate()?;

    let tagged_user = payload
        .tagged_user
        .as_deref()
        .map(str::trim)
        .filter(|name| !name.is_empty());

    comment_service::create_reply(
        &state.db,
        post_id,
        auth_user.user_id,
        &auth_user.username,
        &payload.content,
        tagged_user,
    )
    .await?;

    Ok(Redirect::to(&format!("/post/view?id={}", post_id)))
}
