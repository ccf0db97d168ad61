//! Server-side sessions keyed by the opaque `session_id` cookie value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

use crate::error::Result;

pub const SESSION_COOKIE: &str = "session_id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: i64,
    pub username: String,
    pub authenticated: bool,
}

/// Key → session record store. Implementations never see cookies.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>>;

    /// Creates the entry or overwrites an existing one.
    async fn set(&self, session_id: &str, data: SessionData) -> Result<()>;

    async fn delete(&self, session_id: &str) -> Result<()>;

    /// Drops every session belonging to `user_id`, returning how many went.
    async fn delete_user_sessions(&self, user_id: i64) -> Result<u64>;
}

pub type DynSessionStore = Arc<dyn SessionStore>;

/// Process-local sessions. Entries live until deleted or the process exits.
#[derive(Debug, Default, Clone)]
pub struct MemorySessionStore {
    sessions: Arc<RwLock<HashMap<String, SessionData>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Option<SessionData>> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn set(&self, session_id: &str, data: SessionData) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(session_id.to_string(), data);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn delete_user_sessions(&self, user_id: i64) -> Result<u64> {
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, data| data.user_id != user_id);
        Ok((before - sessions.len()) as u64)
    }
}

pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
