use axum::{Form, extract::State, response::Redirect};
use serde::Deserialize;

use crate::{
    AppState,
    auth::AuthUser,
    error::{AppError, Result},
    handlers::parse_id,
    models::{Vote, VoteTarget},
    services::{comment_service, vote_service},
};

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VoteRequest {
    pub post_id: String,
    pub comment_id: Option<String>,
    pub is_like: String,
}

impl VoteRequest {
    /// The post to return to, and what the vote applies to.
    fn target(&self) -> Result<(i64, Option<i64>)> {
        let post_id = parse_id(&self.post_id, "post")?;
        let comment_id = match self.comment_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_id(raw, "comment")?),
        };
        Ok((post_id, comment_id))
    }
}

/// `POST /like`. Authentication is checked before the form is read.
pub async fn vote(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Form(payload): Form<VoteRequest>,
) -> Result<Redirect> {
    let (post_id, comment_id) = payload.target()?;
    let vote = Vote::from_form_value(payload.is_like.trim());

    let target = match comment_id {
        Some(comment_id) => {
            let comment = comment_service::get_comment_by_id_raw(&state.db, comment_id)
                .await?
                .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;
            if comment.post_id != post_id {
                return Err(AppError::BadRequest(
                    "Comment does not belong to this post".to_string(),
                ));
            }
            VoteTarget::Comment(comment_id)
        }
        None => VoteTarget::Post(post_id),
    };

    vote_service::cast_vote(&state.db, auth_user.user_id, target, vote).await?;

    Ok(Redirect::to(&format!("/post/view?id={}", post_id)))
}
