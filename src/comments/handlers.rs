use axum::{
    extract::{Extension, Json, OriginalUri, Query},
    http::{StatusCode, Uri},
    response::Html,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{error, info};

use super::models::{Comment, CreateComment, PageQuery, WidgetQuery};
use super::services::{find_comments, insert_comment};
use super::validators::CommentValidator;
use crate::auth::models::ProviderName;
use crate::auth::{AuthedUser, MaybeUser, User};
use crate::common::{escape_html, ApiError, AppState, Validator};

/// GET /comments?hostname=&target=
pub async fn list_comments(
    Extension(state): Extension<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let comments = find_comments(&state.db, &query.hostname, &query.target)
        .await
        .map_err(|e| {
            error!(error = %e, hostname = %query.hostname, "Failed to load comments");
            ApiError::DatabaseError(e)
        })?;

    Ok(Json(comments))
}

/// POST /comments
pub async fn create_comment(
    Extension(state): Extension<Arc<AppState>>,
    AuthedUser(user): AuthedUser,
    Json(input): Json<CreateComment>,
) -> Result<(StatusCode, Json<Comment>), ApiError> {
    let validation = CommentValidator.validate(&input);
    if !validation.is_valid {
        return Err(validation.into());
    }

    let comment = insert_comment(&state.db, &user, &input)
        .await
        .map_err(ApiError::DatabaseError)?;

    info!(
        comment_id = %comment.id,
        user_id = %user.id,
        hostname = %input.hostname,
        "Comment created"
    );

    Ok((StatusCode::CREATED, Json(comment)))
}

/// GET /?hostname=&target=&error=
/// The page embedded by the widget iframe
pub async fn widget_page(
    Extension(state): Extension<Arc<AppState>>,
    MaybeUser(user): MaybeUser,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<WidgetQuery>,
) -> Result<Html<String>, ApiError> {
    let comments = find_comments(&state.db, &query.hostname, &query.target)
        .await
        .map_err(ApiError::DatabaseError)?;

    let back_url = return_path(&uri);
    let providers = state.auth.registry().names();

    Ok(Html(render_widget(&WidgetView {
        hostname: &query.hostname,
        target: &query.target,
        error: query.error.as_deref(),
        back_url: &back_url,
        user: user.as_ref(),
        providers: &providers,
        comments: &comments,
    })))
}

/// Page to return to after login or logout, minus any one-off `error` message
pub fn return_path(uri: &Uri) -> String {
    let path = uri.path();
    let query: Vec<&str> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("error"))
        .collect();

    if query.is_empty() {
        path.to_string()
    } else {
        format!("{}?{}", path, query.join("&"))
    }
}

pub struct WidgetView<'a> {
    pub hostname: &'a str,
    pub target: &'a str,
    pub error: Option<&'a str>,
    /// Page to come back to after login or logout
    pub back_url: &'a str,
    pub user: Option<&'a User>,
    pub providers: &'a [ProviderName],
    pub comments: &'a [Comment],
}

const POST_SCRIPT: &str = r#"<script>
document.getElementById("comment-form").addEventListener("submit", async (ev) => {
  ev.preventDefault();
  const root = document.getElementById("comments");
  const body = {
    hostname: root.dataset.hostname,
    target: root.dataset.target,
    content: ev.target.elements.content.value,
  };
  const res = await fetch("/comments", {
    method: "POST",
    headers: { "Content-Type": "application/json" },
    body: JSON.stringify(body),
  });
  if (res.status === 201) { location.reload(); }
});
</script>"#;

/// Render the widget page. Every interpolated value is escaped.
pub fn render_widget(view: &WidgetView<'_>) -> String {
    let back = urlencoding::encode(view.back_url);
    let mut html = String::with_capacity(2048);

    html.push_str("<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>Comments</title>\n</head>\n<body>\n");

    if let Some(message) = view.error.filter(|m| !m.is_empty()) {
        let _ = writeln!(html, "<p class=\"error\">{}</p>", escape_html(message));
    }

    match view.user {
        Some(user) => {
            let _ = writeln!(
                html,
                "<div class=\"user\"><img src=\"{}\" alt=\"\" width=\"32\" height=\"32\"> <span>{}</span> <a href=\"/logout?b={}\">Sign out</a></div>",
                escape_html(&user.image),
                escape_html(&user.name),
                back
            );
        }
        None => {
            html.push_str("<div class=\"login\">");
            for provider in view.providers {
                let _ = write!(
                    html,
                    "<a href=\"/auth/{}?b={}\">Sign in with {}</a> ",
                    provider.as_str(),
                    back,
                    provider.label()
                );
            }
            html.push_str("</div>\n");
        }
    }

    let _ = writeln!(
        html,
        "<div id=\"comments\" data-hostname=\"{}\" data-target=\"{}\">",
        escape_html(view.hostname),
        escape_html(view.target)
    );
    for comment in view.comments {
        let _ = writeln!(
            html,
            "<div class=\"comment\"><img src=\"{}\" alt=\"\" width=\"24\" height=\"24\"> <b>{}</b> <time>{}</time><p>{}</p></div>",
            escape_html(&comment.image),
            escape_html(&comment.name),
            escape_html(&comment.time),
            escape_html(&comment.content)
        );
    }
    html.push_str("</div>\n");

    if view.user.is_some() {
        html.push_str("<form id=\"comment-form\"><textarea name=\"content\" maxlength=\"5000\"></textarea><button type=\"submit\">Post</button></form>\n");
        html.push_str(POST_SCRIPT);
        html.push('\n');
    }

    html.push_str("</body>\n</html>\n");
    html
}
