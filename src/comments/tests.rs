//! Tests for comments module
//!
//! These tests verify:
//! - Comment validation
//! - Storage and per-page lookup
//! - Widget page rendering and escaping

#[cfg(test)]
mod tests {
    use super::super::handlers::{render_widget, return_path, WidgetView};
    use super::super::models::{Comment, CreateComment};
    use super::super::services::{find_comments, insert_comment};
    use super::super::validators::{CommentValidator, MAX_CONTENT_CHARS};
    use crate::auth::models::{ProviderName, User};
    use crate::common::migrations::create_schema;
    use crate::common::{ApiError, Validator};
    use sqlx::sqlite::SqlitePoolOptions;
    use sqlx::SqlitePool;

    async fn setup_test_db() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        create_schema(&pool).await.unwrap();
        pool
    }

    async fn create_user(pool: &SqlitePool, name: &str) -> User {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (name, image, github_id) VALUES (?, ?, ?) RETURNING id, name, email, blog, image, github_id, google_id",
        )
        .bind(name)
        .bind(format!("/user_images/{}.png", name))
        .bind(format!("gh-{}", name))
        .fetch_one(pool)
        .await
        .unwrap()
    }

    fn input(hostname: &str, target: &str, content: &str) -> CreateComment {
        CreateComment {
            hostname: hostname.to_string(),
            target: target.to_string(),
            content: content.to_string(),
        }
    }

    #[test]
    fn test_comment_validation() {
        let validator = CommentValidator;

        assert!(validator.validate(&input("blog.test", "/p/1", "Nice post")).is_valid);

        let empty = validator.validate(&input("blog.test", "/p/1", "   "));
        assert!(!empty.is_valid);
        assert_eq!(empty.errors[0].field, "content");

        let too_long = "x".repeat(MAX_CONTENT_CHARS + 1);
        assert!(!validator.validate(&input("blog.test", "/p/1", &too_long)).is_valid);

        let exactly_max = "x".repeat(MAX_CONTENT_CHARS);
        assert!(validator.validate(&input("blog.test", "/p/1", &exactly_max)).is_valid);

        let no_target = validator.validate(&input("blog.test", "", "hi"));
        assert!(!no_target.is_valid);
        assert_eq!(no_target.errors[0].field, "target");
    }

    #[test]
    fn test_validation_error_maps_to_bad_request() {
        let result = CommentValidator.validate(&input("", "", ""));
        let err: ApiError = result.into();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_insert_and_find_comments_by_page() {
        let pool = setup_test_db().await;
        let alice = create_user(&pool, "alice").await;
        let bob = create_user(&pool, "bob").await;

        let first = insert_comment(&pool, &alice, &input("blog.test", "/p/1", "  first  "))
            .await
            .unwrap();
        insert_comment(&pool, &bob, &input("blog.test", "/p/1", "second"))
            .await
            .unwrap();
        insert_comment(&pool, &bob, &input("blog.test", "/p/2", "elsewhere"))
            .await
            .unwrap();
        insert_comment(&pool, &bob, &input("other.test", "/p/1", "other host"))
            .await
            .unwrap();

        assert_eq!(first.content, "first");
        assert_eq!(first.name, "alice");

        let page = find_comments(&pool, "blog.test", "/p/1").await.unwrap();
        let contents: Vec<&str> = page.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second"]);
        assert_eq!(page[1].name, "bob");
        assert_eq!(page[1].image, "/user_images/bob.png");
        assert_eq!(page[0], first);
    }

    #[tokio::test]
    async fn test_find_comments_on_empty_page() {
        let pool = setup_test_db().await;
        assert!(find_comments(&pool, "blog.test", "/none").await.unwrap().is_empty());
    }

    fn sample_user() -> User {
        User {
            id: 1,
            name: "<b>alice</b>".to_string(),
            email: String::new(),
            blog: String::new(),
            image: "/user_images/a\".png".to_string(),
            github_id: Some("42".to_string()),
            google_id: None,
        }
    }

    #[test]
    fn test_widget_for_anonymous_visitor_lists_providers() {
        let providers = [ProviderName::Github, ProviderName::Google];
        let html = render_widget(&WidgetView {
            hostname: "blog.test",
            target: "/p/1",
            error: None,
            back_url: "/?hostname=blog.test&target=/p/1",
            user: None,
            providers: &providers,
            comments: &[],
        });

        assert!(html.contains(
            "href=\"/auth/github?b=%2F%3Fhostname%3Dblog.test%26target%3D%2Fp%2F1\""
        ));
        assert!(html.contains("Sign in with Google"));
        assert!(!html.contains("comment-form"));
    }

    #[test]
    fn test_widget_escapes_interpolated_text() {
        let user = sample_user();
        let comments = [Comment {
            id: 1,
            content: "<script>alert(1)</script>".to_string(),
            time: "2024-01-01 00:00:00".to_string(),
            name: "mallory".to_string(),
            image: String::new(),
        }];
        let html = render_widget(&WidgetView {
            hostname: "\"><svg>",
            target: "/p/1",
            error: Some("<img src=x onerror=alert(1)>"),
            back_url: "/",
            user: Some(&user),
            providers: &[],
            comments: &comments,
        });

        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(html.contains("&lt;b&gt;alice&lt;/b&gt;"));
        assert!(html.contains("data-hostname=\"&quot;&gt;&lt;svg&gt;\""));
        assert!(html.contains("/user_images/a&quot;.png"));
        assert!(html.contains("href=\"/logout?b=%2F\""));
        assert!(html.contains("comment-form"));
        assert!(!html.contains("<script>alert(1)"));
    }

    #[test]
    fn test_return_path_drops_error_message() {
        let uri = "/?hostname=blog.test&error=Login%20timed%20out&target=%2Fp%2F1"
            .parse()
            .unwrap();
        assert_eq!(return_path(&uri), "/?hostname=blog.test&target=%2Fp%2F1");

        let uri = "/?error=Authorization%20was%20denied".parse().unwrap();
        assert_eq!(return_path(&uri), "/");

        let uri = "/?hostname=blog.test&errors=kept".parse().unwrap();
        assert_eq!(return_path(&uri), "/?hostname=blog.test&errors=kept");

        let uri = "/".parse().unwrap();
        assert_eq!(return_path(&uri), "/");
    }

    #[test]
    fn test_widget_links_carry_clean_return_path() {
        let uri = "/?hostname=blog.test&error=oops".parse().unwrap();
        let back = return_path(&uri);
        let providers = [ProviderName::Github];

        let html = render_widget(&WidgetView {
            hostname: "blog.test",
            target: "",
            error: Some("oops"),
            back_url: &back,
            user: None,
            providers: &providers,
            comments: &[],
        });

        assert!(html.contains("/auth/github?b=%2F%3Fhostname%3Dblog.test\""));
        assert!(!html.contains("error%3D"));
    }
}
