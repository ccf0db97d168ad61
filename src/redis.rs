use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::{
    error::{AppError, Result},
    session::{SessionData, SessionStore},
};

/// Sessions shared between forum instances. Entries expire after `ttl_seconds`.
///
/// Each user's session ids are also indexed in `user_sessions:<user_id>` so
/// account deletion can drop them all.
#[derive(Clone)]
pub struct RedisSessionStore {
    manager: Arc<Mutex<ConnectionManager>>,
    ttl_seconds: u64,
}

impl RedisSessionStore {
    pub async fn new(redis_url: &str, ttl_seconds: u64) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let manager = ConnectionManager::new(client).await?;
        Ok(Self {
            manager: Arc::new(Mutex::new(manager)),
            ttl_seconds,
        })
    }

    fn key(session_id: &str) -> String {
        format!("session:{}", session_id)
    }

    fn user_key(user_id: i64) -> String {
        format!("user_sessions:{}", user_id)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>> {
        let mut conn = self.manager.lock().await;

        let raw: Option<String> = conn.get(Self::key(session_id)).await?;
        match raw {
            Some(raw) => {
                let data = serde_json::from_str(&raw).map_err(|e| {
                    AppError::Internal(format!("Corrupt session {}: {}", session_id, e))
                })?;
                Ok(Some(data))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, session_id: &str, data: SessionData) -> Result<()> {
        let raw = serde_json::to_string(&data)
            .map_err(|e| AppError::Internal(format!("Failed to encode session: {}", e)))?;

        let user_key = Self::user_key(data.user_id);
        let mut conn = self.manager.lock().await;
        let _: () = redis::pipe()
            .atomic()
            .set_ex(Self::key(session_id), raw, self.ttl_seconds)
            .ignore()
            .sadd(&user_key, session_id)
            .ignore()
            .expire(&user_key, self.ttl_seconds as i64)
            .ignore()
            .query_async(&mut *conn)
            .await?;
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let data = self.get(session_id).await?;

        let mut conn = self.manager.lock().await;
        let mut pipe = redis::pipe();
        pipe.atomic().del(Self::key(session_id)).ignore();
        if let Some(data) = data {
            pipe.srem(Self::user_key(data.user_id), session_id).ignore();
        }
        let _: () = pipe.query_async(&mut *conn).await?;
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: i64) -> Result<u64> {
        let user_key = Self::user_key(user_id);
        let mut conn = self.manager.lock().await;

        let session_ids: Vec<String> = conn.smembers(&user_key).await?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        for session_id in &session_ids {
            pipe.del(Self::key(session_id)).ignore();
        }
        pipe.del(&user_key).ignore();
        let _: () = pipe.query_async(&mut *conn).await?;

        Ok(session_ids.len() as u64)
    }
}
