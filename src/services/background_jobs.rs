use sqlx::SqlitePool;
use tokio::time::{Duration, interval};

use crate::services::auth_service;

#[derive(Clone)]
pub struct BackgroundJobsService {
    db: SqlitePool,
}

impl BackgroundJobsService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Start all background jobs
    pub fn start_all_jobs(&self) {
        let jobs_service = self.clone();

        // Purge expired password reset tokens every hour
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(3600));
            loop {
                interval.tick().await;
                match auth_service::purge_expired_reset_tokens(&jobs_service.db).await {
                    Ok(0) => {}
                    Ok(purged) => tracing::info!("Purged {} expired reset tokens", purged),
                    Err(e) => tracing::error!("Failed to purge reset tokens: {}", e),
                }
            }
        });

        tracing::info!("Background jobs started");
    }
}
