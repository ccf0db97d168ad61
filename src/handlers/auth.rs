use axum::{
    Form,
    extract::{Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::CookieJar;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use validator::Validate;

use crate::{
    AppState,
    auth::{self, AuthUser, hash_password, verify_password},
    error::{AppError, Result},
    services::{auth_service, email_service, user_service},
    session::SESSION_COOKIE,
};

static USERNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+$").unwrap_or_else(|e| panic!("invalid username pattern: {e}"))
});

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 50, message = "Username must be 3-50 characters"))]
    pub username: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ResetPasswordRequest {
    pub token: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConfirmQuery {
    pub token: String,
}

pub async fn register(
    State(state): State<AppState>,
    Form(payload): Form<RegisterRequest>,
) -> Result<Redirect> {
    payload.validate()?;

    if !USERNAME_RE.is_match(&payload.username) {
        return Err(AppError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }

    let email = payload.email.trim().to_lowercase();
    let password_hash = hash_password(&payload.password, state.config.bcrypt_cost)?;
    let confirm_token = auth_service::generate_token();

    let user = user_service::create_user(
        &state.db,
        &payload.username,
        &email,
        &password_hash,
        &confirm_token,
    )
    .await?;

    let mailer = state.email_service.clone();
    email_service::send_in_background("welcome", async move {
        mailer
            .send_welcome_email(&user.email, &user.username, &confirm_token)
            .await
    });

    Ok(Redirect::to("/login"))
}

pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(payload): Form<LoginRequest>,
) -> Result<(CookieJar, Redirect)> {
    let invalid = || AppError::Authentication("Invalid email or password".to_string());

    let email = payload.email.trim().to_lowercase();
    let user = user_service::get_user_by_email(&state.db, &email)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(&payload.password, &user.password_hash)? {
        tracing::debug!(user_id = user.id, "rejected login");
        return Err(invalid());
    }

    let session_id = auth::start_session(&state, user.id, &user.username).await?;
    tracing::info!(user_id = user.id, "user logged in");

    let jar = jar.add(auth::session_cookie(session_id, state.config.cookie_secure));
    Ok((jar, Redirect::to("/")))
}

pub async fn logout(State(state): State<AppState>, jar: CookieJar) -> Result<(CookieJar, Redirect)> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        state.sessions.delete(cookie.value()).await?;
    }

    let jar = jar.remove(auth::removal_cookie());
    Ok((jar, Redirect::to("/login")))
}

pub async fn confirm_email(
    State(state): State<AppState>,
    Query(query): Query<ConfirmQuery>,
) -> Result<Redirect> {
    user_service::confirm_email(&state.db, query.token.trim()).await?;
    Ok(Redirect::to("/login"))
}

pub async fn forgot_password(
    State(state): State<AppState>,
    Form(payload): Form<ForgotPasswordRequest>,
) -> Result<Redirect> {
    let email = payload.email.trim().to_lowercase();
    let ttl_minutes = state.config.reset_token_ttl_minutes;

    if let Some((user, token)) =
        auth_service::create_password_reset(&state.db, &email, ttl_minutes).await?
    {
        let mailer = state.email_service.clone();
        email_service::send_in_background("password reset", async move {
            mailer
                .send_password_reset_email(&user.email, &user.username, &token, ttl_minutes)
                .await
        });
    }

    // Same answer whether or not the email is registered
    Ok(Redirect::to("/login"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Form(payload): Form<ResetPasswordRequest>,
) -> Result<Redirect> {
    payload.validate()?;

    let token = payload.token.trim();
    if token.is_empty() {
        return Err(AppError::BadRequest("Invalid or expired token".to_string()));
    }

    let password_hash = hash_password(&payload.password, state.config.bcrypt_cost)?;
    auth_service::reset_password(&state.db, token, &password_hash).await?;

    Ok(Redirect::to("/login"))
}

pub async fn delete_account(
    State(state): State<AppState>,
    auth_user: AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect)> {
    user_service::delete_account(&state.db, auth_user.user_id).await?;
    let dropped = state.sessions.delete_user_sessions(auth_user.user_id).await?;
    tracing::debug!(user_id = auth_user.user_id, dropped, "sessions removed");

    let jar = jar.remove(auth::removal_cookie());
    Ok((jar, Redirect::to("/login")))
}
