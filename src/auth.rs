use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};

use crate::{
    AppState,
    error::{AppError, Result},
    session::{SESSION_COOKIE, SessionData},
};

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: i64,
    pub username: String,
    pub session_id: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let jar = CookieJar::from_headers(&parts.headers);

        let session_id = jar
            .get(SESSION_COOKIE)
            .map(|cookie| cookie.value().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Authentication("Missing session cookie".to_string()))?;

        let session = state
            .sessions
            .get(&session_id)
            .await?
            .ok_or_else(|| AppError::Authentication("Session expired".to_string()))?;

        if !session.authenticated {
            return Err(AppError::Authentication("Not logged in".to_string()));
        }

        Ok(AuthUser {
            user_id: session.user_id,
            username: session.username,
            session_id,
        })
    }
}

// Optional auth user (for pages that render for guests too)
#[derive(Debug)]
pub struct OptionalAuthUser(pub Option<AuthUser>);

impl OptionalAuthUser {
    pub fn is_authenticated(&self) -> bool {
        self.0.is_some()
    }

    pub fn username(&self) -> Option<String> {
        self.0.as_ref().map(|user| user.username.clone())
    }
}

impl FromRequestParts<AppState> for OptionalAuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        // Only a missing or unknown session means a guest; store failures surface
        match AuthUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(OptionalAuthUser(Some(user))),
            Err(AppError::Authentication(_)) => Ok(OptionalAuthUser(None)),
            Err(e) => Err(e),
        }
    }
}

/// Stores a fresh authenticated session and returns its id.
pub async fn start_session(state: &AppState, user_id: i64, username: &str) -> Result<String> {
    let session_id = crate::session::new_session_id();
    let data = SessionData {
        user_id,
        username: username.to_string(),
        authenticated: true,
    };
    state.sessions.set(&session_id, data).await?;
    Ok(session_id)
}

pub fn session_cookie(session_id: String, secure: bool) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .build()
}

pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, "")).path("/").build()
}

// Password hashing utilities
pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    bcrypt::hash(password, cost).map_err(AppError::from)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    bcrypt::verify(password, hash).map_err(AppError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::Config,
        session::{DynSessionStore, MemorySessionStore, SessionStore},
    };
    use async_trait::async_trait;
    use axum::http::{Request, header};
    use std::sync::Arc;

    struct UnreachableStore;

    #[async_trait]
    impl SessionStore for UnreachableStore {
        async fn get(&self, _: &str) -> Result<Option<SessionData>> {
            Err(AppError::Internal("session backend down".to_string()))
        }

        async fn set(&self, _: &str, _: SessionData) -> Result<()> {
            Err(AppError::Internal("session backend down".to_string()))
        }

        async fn delete(&self, _: &str) -> Result<()> {
            Err(AppError::Internal("session backend down".to_string()))
        }

        async fn delete_user_sessions(&self, _: i64) -> Result<u64> {
            Err(AppError::Internal("session backend down".to_string()))
        }
    }

    fn state_with(sessions: DynSessionStore) -> AppState {
        let db = sqlx::SqlitePool::connect_lazy("sqlite::memory:").unwrap();
        AppState::new(db, sessions, Config::default())
    }

    fn parts(cookie: Option<&str>) -> Parts {
        let mut request = Request::builder();
        if let Some(cookie) = cookie {
            request = request.header(header::COOKIE, cookie);
        }
        request.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn optional_user_is_guest_without_a_valid_session() {
        let state = state_with(Arc::new(MemorySessionStore::new()));

        let viewer = OptionalAuthUser::from_request_parts(&mut parts(None), &state)
            .await
            .unwrap();
        assert!(!viewer.is_authenticated());

        let viewer = OptionalAuthUser::from_request_parts(&mut parts(Some("session_id=gone")), &state)
            .await
            .unwrap();
        assert!(!viewer.is_authenticated());
    }

    #[tokio::test]
    async fn optional_user_surfaces_store_failures() {
        let state = state_with(Arc::new(UnreachableStore));

        let err = OptionalAuthUser::from_request_parts(&mut parts(Some("session_id=abc")), &state)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));

        // No cookie never reaches the store
        let viewer = OptionalAuthUser::from_request_parts(&mut parts(None), &state)
            .await
            .unwrap();
        assert!(!viewer.is_authenticated());
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse", 4).unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn session_cookie_attributes() {
        let cookie = session_cookie("abc".to_string(), true);
        assert_eq!(cookie.name(), SESSION_COOKIE);
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.same_site(), Some(SameSite::Lax));
    }
}
