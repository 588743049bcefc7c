use super::handlers;
use axum::{routing::get, Router};

/// Creates the comments router
///
/// # Routes
/// - `GET /` - Widget page
/// - `GET /comments` - Comments on a page
/// - `POST /comments` - Post a comment (signed in)
pub fn comments_routes() -> Router {
    Router::new()
        .route("/", get(handlers::widget_page))
        .route(
            "/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
}
