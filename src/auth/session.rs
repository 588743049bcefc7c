//! Cookie session binding
//!
//! Sessions are managed by `tower-sessions`; the only thing stored in them is
//! the local user id under [`SESSION_USER_ID_KEY`].

use async_trait::async_trait;
use tower_sessions::Session;

pub const SESSION_USER_ID_KEY: &str = "user_id";

#[derive(Debug, thiserror::Error)]
#[error("Session store error: {0}")]
pub struct SessionError(pub String);

/// Something a successful login can be bound to
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    async fn bind_user(&self, user_id: i64) -> Result<(), SessionError>;
}

#[async_trait]
impl SessionIssuer for Session {
    async fn bind_user(&self, user_id: i64) -> Result<(), SessionError> {
        // Fresh id on privilege change
        self.cycle_id()
            .await
            .map_err(|e| SessionError(e.to_string()))?;
        self.insert(SESSION_USER_ID_KEY, user_id)
            .await
            .map_err(|e| SessionError(e.to_string()))
    }
}

/// User id bound to this session, if any
pub async fn session_user_id(session: &Session) -> Result<Option<i64>, SessionError> {
    session
        .get::<i64>(SESSION_USER_ID_KEY)
        .await
        .map_err(|e| SessionError(e.to_string()))
}

/// Drop everything stored in the session and delete it from the store
pub async fn clear_session(session: &Session) -> Result<(), SessionError> {
    session.flush().await.map_err(|e| SessionError(e.to_string()))
}
