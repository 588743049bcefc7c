//! Authentication routes

use axum::{routing::get, Router};

use super::handlers;

/// Creates and returns the authentication router
///
/// # Routes
/// - `GET /auth/:provider` - Start an OAuth login (`?b=` is the page to return to)
/// - `GET /auth/:provider/callback` - Provider redirect target
/// - `GET /logout` - Clear the session
/// - `GET /api/me` - Get current user information
pub fn auth_routes() -> Router {
    Router::new()
        .route("/auth/:provider", get(handlers::login_start))
        .route("/auth/:provider/callback", get(handlers::login_callback))
        .route("/logout", get(handlers::logout))
        .route("/api/me", get(handlers::me_handler))
}
