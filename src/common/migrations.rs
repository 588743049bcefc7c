// src/common/migrations.rs
//! Database migration and schema management

use sqlx::SqlitePool;
use std::env;
use tracing::{info, warn};

/// Run all database migrations
///
/// Tables are created only when missing, so restarts keep existing data.
/// Set `RESET_DB=true` to drop everything first.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let should_reset_db = env::var("RESET_DB").unwrap_or_else(|_| "false".to_string()) == "true";

    if should_reset_db {
        warn!("⚠️  RESET_DB=true - Dropping all tables and recreating schema...");
        drop_all_tables(pool).await?;
        info!("Dropped old tables");
    }

    create_schema(pool).await?;

    info!("✅ Database migration completed successfully!");
    Ok(())
}

/// Create all tables and indexes if they don't exist yet
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_user_tables(pool).await?;
    create_auth_state_tables(pool).await?;
    create_comment_tables(pool).await?;
    create_indexes(pool).await?;
    Ok(())
}

async fn drop_all_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Reverse dependency order
    let tables = ["comments", "auth_states", "users"];

    for table in tables {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", table))
            .execute(pool)
            .await?;
    }

    Ok(())
}

async fn create_user_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL DEFAULT '',
            email TEXT NOT NULL DEFAULT '',
            blog TEXT NOT NULL DEFAULT '',
            image TEXT NOT NULL DEFAULT '',
            github_id TEXT,
            google_id TEXT,
            created_at TEXT DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_auth_state_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // issued_at is unix milliseconds
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS auth_states (
            state TEXT PRIMARY KEY,
            provider TEXT NOT NULL,
            back_url TEXT NOT NULL,
            issued_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_comment_tables(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL,
            target TEXT NOT NULL,
            hostname TEXT NOT NULL DEFAULT '',
            user_id INTEGER NOT NULL REFERENCES users(id),
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_indexes(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let indexes = [
        // One local user per external identity
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_github_id ON users(github_id) WHERE github_id IS NOT NULL AND github_id != ''",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_google_id ON users(google_id) WHERE google_id IS NOT NULL AND google_id != ''",
        "CREATE INDEX IF NOT EXISTS idx_auth_states_issued_at ON auth_states(issued_at)",
        "CREATE INDEX IF NOT EXISTS idx_comments_page ON comments(hostname, target)",
    ];

    for statement in indexes {
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_schema_is_idempotent() {
        let pool = setup_test_db().await;
        create_schema(&pool).await.unwrap();
        create_schema(&pool).await.unwrap();

        let tables: Vec<(String,)> = sqlx::query_as(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name IN ('users', 'auth_states', 'comments') ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        let names: Vec<&str> = tables.iter().map(|(n,)| n.as_str()).collect();
        assert_eq!(names, vec!["auth_states", "comments", "users"]);
    }

    #[tokio::test]
    async fn test_github_id_is_unique() {
        let pool = setup_test_db().await;
        create_schema(&pool).await.unwrap();

        sqlx::query("INSERT INTO users (name, github_id) VALUES ('a', '42')")
            .execute(&pool)
            .await
            .unwrap();

        let err = sqlx::query("INSERT INTO users (name, github_id) VALUES ('b', '42')")
            .execute(&pool)
            .await
            .unwrap_err();

        match err {
            sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
            other => panic!("expected unique violation, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_external_ids_do_not_collide() {
        let pool = setup_test_db().await;
        create_schema(&pool).await.unwrap();

        // Google-only users leave github_id NULL; many such rows are allowed
        for name in ["a", "b", "c"] {
            sqlx::query("INSERT INTO users (name, google_id) VALUES (?, ?)")
                .bind(name)
                .bind(format!("g-{}", name))
                .execute(&pool)
                .await
                .unwrap();
        }

        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 3);
    }
}
