use lions_forum::config::Config;
use lions_forum::database::{create_pool, run_migrations};
use lions_forum::services::background_jobs::BackgroundJobsService;
use lions_forum::{AppState, connect_session_store, create_app};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lions_forum=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database connection pool
    let db = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Run migrations
    run_migrations(&db).await?;
    tracing::info!("Database migrations completed");

    // Session backend
    let sessions = connect_session_store(&config).await?;
    tracing::info!("Session store ready ({:?})", config.session_backend);

    if config.mail_api_key.is_none() {
        tracing::warn!("MAIL_API_KEY not set; outgoing mail will only be logged");
    }

    tokio::fs::create_dir_all(&config.upload_dir).await?;

    BackgroundJobsService::new(db.clone()).start_all_jobs();

    let addr = format!("{}:{}", config.host, config.port);

    // Create application
    let app = create_app(AppState::new(db, sessions, config));

    // Create listener
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
