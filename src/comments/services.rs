use sqlx::SqlitePool;

use super::models::{Comment, CreateComment};
use crate::auth::User;

/// All comments on one page, oldest first
pub async fn find_comments(
    db: &SqlitePool,
    hostname: &str,
    target: &str,
) -> Result<Vec<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(
        r#"
        SELECT c.id, c.content, c.created_at AS time, u.name, u.image
        FROM comments c
        INNER JOIN users u ON c.user_id = u.id
        WHERE c.hostname = ? AND c.target = ?
        ORDER BY c.id ASC
        "#,
    )
    .bind(hostname)
    .bind(target)
    .fetch_all(db)
    .await
}

pub async fn insert_comment(
    db: &SqlitePool,
    author: &User,
    input: &CreateComment,
) -> Result<Comment, sqlx::Error> {
    let (id, time): (i64, String) = sqlx::query_as(
        r#"
        INSERT INTO comments (content, target, hostname, user_id)
        VALUES (?, ?, ?, ?)
        RETURNING id, created_at
        "#,
    )
    .bind(input.content.trim())
    .bind(&input.target)
    .bind(&input.hostname)
    .bind(author.id)
    .fetch_one(db)
    .await?;

    Ok(Comment {
        id,
        content: input.content.trim().to_string(),
        time,
        name: author.name.clone(),
        image: author.image.clone(),
    })
}
