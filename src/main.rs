// src/main.rs
use axum::{extract::Extension, Router};
use dotenv::dotenv;
use reqwest::Client;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::PathBuf;
use std::time::Duration;
use std::{net::SocketAddr, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};
use tower_sessions::cookie::{time::Duration as CookieDuration, SameSite};
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// MODULE IMPORTS
// ============================================================================

mod auth;
mod comments;
mod common;
mod services;

// ============================================================================
// COMMON IMPORTS
// ============================================================================

use auth::{AuthFlow, IdentityResolver, ProviderRegistry, StateLedger};
use common::{AppConfig, AppState};
use services::AvatarMirror;

const STATE_PURGE_INTERVAL: Duration = Duration::from_secs(10 * 60);

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    // ========================================================================
    // ENVIRONMENT CONFIGURATION
    // ========================================================================

    let config = AppConfig::from_env()?;

    // ========================================================================
    // DIRECTORY SETUP
    // ========================================================================

    tokio::fs::create_dir_all(config.user_image_path()).await?;

    // ========================================================================
    // DATABASE SETUP
    // ========================================================================

    if let Some(path_part) = config.database_url.strip_prefix("sqlite://") {
        let path_without_params = path_part.split('?').next().unwrap_or("");
        if !path_without_params.is_empty() && !path_without_params.starts_with(':') {
            let db_path = PathBuf::from(path_without_params);
            if let Some(parent) = db_path.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent).await?;
                }
            }
        }
    }

    let connect_options =
        SqliteConnectOptions::from_str(&config.database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .connect_with(connect_options)
        .await?;

    // Run database migrations
    common::migrations::run_migrations(&pool).await?;

    // ========================================================================
    // SERVICE INITIALIZATION
    // ========================================================================

    let http_client = Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(30))
        .build()?;

    let registry = ProviderRegistry::from_config(&config, http_client.clone())?;
    if registry.names().is_empty() {
        warn!("No identity provider configured; set GITHUB_CLIENT_ID/GITHUB_CLIENT_SECRET or GOOGLE_CLIENT_ID/GOOGLE_CLIENT_SECRET");
    }

    let ledger = StateLedger::new(pool.clone());
    ledger.clone().start_cleanup_task(STATE_PURGE_INTERVAL);
    info!("OAuth state cleanup task started");

    let mirror = AvatarMirror::new(
        http_client,
        config.user_image_path(),
        &config.user_image_dir,
    );
    let resolver = IdentityResolver::new(pool.clone(), config.refresh_profile_on_login);
    let auth_flow = AuthFlow::new(ledger, registry, mirror, resolver);

    // ========================================================================
    // SESSIONS
    // ========================================================================

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_name(config.session_cookie_name.clone())
        .with_secure(config.cookie_secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(CookieDuration::days(30)));

    // ========================================================================
    // APPLICATION STATE
    // ========================================================================

    let port = config.port;
    let static_dir = config.static_dir.clone();
    let cors_origins: Vec<axum::http::HeaderValue> = config
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    let shared = Arc::new(AppState::new(pool, auth_flow));

    // ========================================================================
    // ROUTER COMPOSITION
    // ========================================================================

    let app = Router::new()
        // ====================================================================
        // AUTHENTICATION ROUTES
        // ====================================================================
        .merge(auth::auth_routes())
        // ====================================================================
        // COMMENT ROUTES AND WIDGET PAGE
        // ====================================================================
        .merge(comments::comments_routes())
        // Mirrored avatars and widget assets
        .fallback_service(ServeDir::new(static_dir))
        // ====================================================================
        // MIDDLEWARE AND LAYERS
        // ====================================================================
        .layer(session_layer)
        .layer(Extension(shared))
        .layer(
            CorsLayer::new()
                .allow_origin(cors_origins)
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers([axum::http::header::CONTENT_TYPE])
                .allow_credentials(true),
        )
        .layer(TraceLayer::new_for_http());

    // ========================================================================
    // SERVER STARTUP
    // ========================================================================

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
