//! HTTP handlers for the login flow

use axum::{
    extract::{Extension, Json, Path, Query},
    response::{IntoResponse, Redirect, Response},
};
use std::sync::Arc;
use tower_sessions::Session;
use tracing::{error, info, warn};

use super::extractors::AuthedUser;
use super::flow::{validate_return_url, AuthError};
use super::models::{CallbackQuery, LoginQuery, LogoutQuery};
use super::session::clear_session;
use crate::common::{safe_email_log, ApiError, AppState};

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::BadRequest(msg) => ApiError::BadRequest(msg),
            AuthError::UnknownProvider(name) => {
                ApiError::NotFound(format!("Unknown provider '{}'", name))
            }
            AuthError::Forged => ApiError::BadRequest("Invalid login state".to_string()),
            AuthError::TimedOut => ApiError::BadRequest(TIMED_OUT_MESSAGE.to_string()),
            AuthError::UpstreamAuth(_) => ApiError::BadRequest(UPSTREAM_AUTH_MESSAGE.to_string()),
            AuthError::UpstreamProfile(_) => {
                ApiError::BadRequest(UPSTREAM_PROFILE_MESSAGE.to_string())
            }
            AuthError::Storage(e) => ApiError::DatabaseError(e),
            AuthError::Session(e) => {
                error!(error = %e, "Failed to bind session");
                ApiError::InternalServer("Failed to start session".to_string())
            }
        }
    }
}

const TIMED_OUT_MESSAGE: &str = "Login timed out, please try again";
const UPSTREAM_AUTH_MESSAGE: &str = "Could not get an access token from the provider";
const UPSTREAM_PROFILE_MESSAGE: &str = "Could not fetch your profile from the provider";
const DENIED_MESSAGE: &str = "Authorization was denied";

/// Send the visitor back to the widget page with a readable message
fn error_redirect(message: &str) -> Response {
    Redirect::temporary(&format!("/?error={}", urlencoding::encode(message))).into_response()
}

/// GET /auth/:provider?b=<return url>
/// Redirects to the provider's consent page
pub async fn login_start(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<LoginQuery>,
) -> Result<Redirect, ApiError> {
    let return_url = query.b.unwrap_or_default();

    let auth_url = state.auth.start(&provider, &return_url).await.map_err(|e| {
        warn!(provider = %provider, error = %e, "Login start rejected");
        ApiError::from(e)
    })?;

    Ok(Redirect::temporary(&auth_url))
}

/// GET /auth/:provider/callback?code=&state=
/// Completes the login, binds the session and returns to the page the login started on
pub async fn login_callback(
    Extension(state): Extension<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<CallbackQuery>,
    session: Session,
) -> Result<Response, ApiError> {
    if let Some(reason) = query.error.as_deref() {
        warn!(provider = %provider, reason = %reason, "Provider reported an authorization error");
        return Ok(error_redirect(DENIED_MESSAGE));
    }

    let code = query.code.unwrap_or_default();
    let state_token = query.state.unwrap_or_default();

    match state
        .auth
        .callback(&provider, &code, &state_token, &session)
        .await
    {
        Ok(outcome) => {
            info!(
                user_id = %outcome.user.id,
                email = %safe_email_log(&outcome.user.email),
                "Login callback completed"
            );
            Ok(Redirect::temporary(&outcome.return_url).into_response())
        }
        Err(AuthError::TimedOut) => Ok(error_redirect(TIMED_OUT_MESSAGE)),
        Err(AuthError::UpstreamAuth(e)) => {
            warn!(provider = %provider, error = %e, "Token exchange failed");
            Ok(error_redirect(UPSTREAM_AUTH_MESSAGE))
        }
        Err(AuthError::UpstreamProfile(e)) => {
            warn!(provider = %provider, error = %e, "Profile fetch failed");
            Ok(error_redirect(UPSTREAM_PROFILE_MESSAGE))
        }
        Err(e) => {
            warn!(provider = %provider, error = %e, "Login callback rejected");
            Err(e.into())
        }
    }
}

/// GET /logout?b=<return url>
pub async fn logout(session: Session, Query(query): Query<LogoutQuery>) -> Result<Redirect, ApiError> {
    clear_session(&session).await.map_err(|e| {
        error!(error = %e, "Failed to clear session");
        ApiError::InternalServer("Failed to sign out".to_string())
    })?;

    let target = query
        .b
        .filter(|b| validate_return_url(b).is_ok())
        .unwrap_or_else(|| "/".to_string());

    info!("User signed out");
    Ok(Redirect::temporary(&target))
}

/// GET /api/me
/// Returns the signed-in user
///
/// # Response
/// ```json
/// {
///   "user": { "id": 1, "name": "alice", "email": "", "blog": "...", "image": "/user_images/..." }
/// }
/// ```
pub async fn me_handler(AuthedUser(user): AuthedUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "user": user }))
}
