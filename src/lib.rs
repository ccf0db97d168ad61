pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod models;
pub mod redis;
pub mod services;
pub mod session;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::{
    config::{Config, SessionBackend},
    error::Result,
    redis::RedisSessionStore,
    services::{email_service::EmailService, upload_service::{UPLOADS_ROUTE, UploadService}},
    session::{DynSessionStore, MemorySessionStore},
};

/// Room for the text fields sent alongside an image.
const FORM_OVERHEAD: usize = 64 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub sessions: DynSessionStore,
    pub config: Arc<Config>,
    pub email_service: Arc<EmailService>,
    pub upload_service: Arc<UploadService>,
}

impl AppState {
    pub fn new(db: SqlitePool, sessions: DynSessionStore, config: Config) -> Self {
        let email_service = Arc::new(EmailService::new(&config));
        let upload_service = Arc::new(UploadService::new(
            &config.upload_dir,
            config.max_file_size,
        ));

        Self {
            db,
            sessions,
            config: Arc::new(config),
            email_service,
            upload_service,
        }
    }
}

/// Builds the session backend selected by `SESSION_BACKEND`.
pub async fn connect_session_store(config: &Config) -> Result<DynSessionStore> {
    let store: DynSessionStore = match config.session_backend {
        SessionBackend::Memory => Arc::new(MemorySessionStore::new()),
        SessionBackend::Redis => Arc::new(
            RedisSessionStore::new(&config.redis_url, config.session_ttl_seconds).await?,
        ),
    };
    Ok(store)
}

pub fn create_app(state: AppState) -> Router {
    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/", get(handlers::users::home))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route(
            "/logout",
            get(handlers::auth::logout).post(handlers::auth::logout),
        )
        .route("/confirm", get(handlers::auth::confirm_email))
        .route(
            "/password-reset-request",
            post(handlers::auth::forgot_password),
        )
        .route("/reset-password", post(handlers::auth::reset_password))
        .route("/post", get(handlers::posts::get_posts))
        .route("/filter", get(handlers::posts::filter_posts))
        .route("/post/view", get(handlers::posts::view_post));

    // Protected routes
    let protected_routes = Router::new()
        .route("/profile", get(handlers::users::get_profile))
        .route("/activity", get(handlers::users::get_activity))
        .route("/delete-account", post(handlers::auth::delete_account))
        .route("/post/create", post(handlers::posts::create_post))
        .route("/post/reply", post(handlers::comments::create_reply))
        .route("/post/delete", post(handlers::posts::delete_post))
        .route("/post/image", post(handlers::upload::upload_post_image))
        .route("/like", post(handlers::votes::vote));

    let uploads = ServeDir::new(&state.config.upload_dir);
    let body_limit = state.config.max_file_size + FORM_OVERHEAD;

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .nest_service(UPLOADS_ROUTE, uploads)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(body_limit)),
        )
        .with_state(state)
}
