//! Authentication extractors for Axum

use async_trait::async_trait;
use axum::{
    extract::{Extension, FromRequestParts},
    http::request::Parts,
};
use std::sync::Arc;
use tower_sessions::Session;
use tracing::{debug, error, warn};

use super::models::User;
use super::session::session_user_id;
use crate::common::{ApiError, AppState};

/// Authenticated user extractor
///
/// Resolves the user bound to the request's session cookie. Rejects with
/// 401 when no user is signed in.
#[derive(Debug)]
pub struct AuthedUser(pub User);

/// Like [`AuthedUser`], but anonymous visitors are not an error
#[derive(Debug)]
pub struct MaybeUser(pub Option<User>);

async fn current_user<S>(parts: &mut Parts, state: &S) -> Result<Option<User>, ApiError>
where
    S: Send + Sync,
{
    let Extension(app_state): Extension<Arc<AppState>> =
        Extension::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::InternalServer("missing app state".to_string()))?;

    let session = Session::from_request_parts(parts, state)
        .await
        .map_err(|(_, msg)| ApiError::InternalServer(msg.to_string()))?;

    let user_id = session_user_id(&session).await.map_err(|e| {
        error!(error = %e, "Failed to read session");
        ApiError::InternalServer("Failed to read session".to_string())
    })?;

    let Some(user_id) = user_id else {
        return Ok(None);
    };

    let user = app_state
        .auth
        .resolver()
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "Database error during session user lookup");
            ApiError::DatabaseError(e)
        })?;

    if user.is_none() {
        warn!(user_id = %user_id, "Session refers to a user that no longer exists");
    }

    Ok(user)
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match current_user(parts, state).await? {
            Some(user) => {
                debug!(user_id = %user.id, "Session authenticated");
                Ok(AuthedUser(user))
            }
            None => Err(ApiError::Unauthorized("Not signed in".to_string())),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(current_user(parts, state).await?))
    }
}
