// src/common/config.rs
//! Application configuration
//!
//! Everything the service needs is read once at startup into an [`AppConfig`]
//! value and handed to the constructors that need it. Nothing reads the
//! environment after boot.

use anyhow::Context;
use std::env;
use std::path::PathBuf;

pub const GITHUB_AUTH_URL: &str = "https://github.com/login/oauth/authorize";
pub const GITHUB_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const GITHUB_PROFILE_URL: &str = "https://api.github.com/user";

pub const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
pub const GOOGLE_PROFILE_URL: &str = "https://www.googleapis.com/oauth2/v2/userinfo";
pub const GOOGLE_PROFILE_SCOPE: &str = "https://www.googleapis.com/auth/userinfo.profile";

/// Credentials and endpoints for one identity provider
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub profile_url: String,
    pub scopes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub port: u16,
    pub static_dir: PathBuf,
    /// Directory under `static_dir` holding mirrored avatars; also the URL prefix
    pub user_image_dir: String,
    pub session_cookie_name: String,
    pub cookie_secure: bool,
    pub refresh_profile_on_login: bool,
    pub cors_origins: Vec<String>,
    pub github: Option<ProviderConfig>,
    pub google: Option<ProviderConfig>,
}

impl AppConfig {
    /// Load configuration from process environment (after `.env` has been applied)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let flag = |key: &str| {
            get(key)
                .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(false)
        };

        let port = match get("PORT") {
            Some(p) => p
                .parse::<u16>()
                .with_context(|| format!("PORT must be a valid port number, got '{}'", p))?,
            None => 8080,
        };

        let base_url = get("BASE_URL").unwrap_or_else(|| format!("http://localhost:{}", port));
        let base_url = base_url.trim_end_matches('/').to_string();

        let github = provider_from_lookup(&get, "GITHUB", "github", &base_url).map(|mut cfg| {
            cfg.auth_url = get("GITHUB_AUTH_URL").unwrap_or_else(|| GITHUB_AUTH_URL.to_string());
            cfg.token_url =
                get("GITHUB_TOKEN_URL").unwrap_or_else(|| GITHUB_TOKEN_URL.to_string());
            cfg.profile_url =
                get("GITHUB_PROFILE_URL").unwrap_or_else(|| GITHUB_PROFILE_URL.to_string());
            cfg
        });

        let google = provider_from_lookup(&get, "GOOGLE", "google", &base_url).map(|mut cfg| {
            cfg.auth_url = get("GOOGLE_AUTH_URL").unwrap_or_else(|| GOOGLE_AUTH_URL.to_string());
            cfg.token_url =
                get("GOOGLE_TOKEN_URL").unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string());
            cfg.profile_url =
                get("GOOGLE_PROFILE_URL").unwrap_or_else(|| GOOGLE_PROFILE_URL.to_string());
            cfg.scopes = vec![GOOGLE_PROFILE_SCOPE.to_string()];
            cfg
        });

        let cors_origins = get("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            database_url: get("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://comments.db".to_string()),
            port,
            static_dir: PathBuf::from(get("STATIC_DIR").unwrap_or_else(|| "./static".to_string())),
            user_image_dir: get("USER_IMAGE_DIR")
                .map(|d| d.trim_matches('/').to_string())
                .unwrap_or_else(|| "user_images".to_string()),
            session_cookie_name: get("SESSION_COOKIE_NAME").unwrap_or_else(|| "is".to_string()),
            cookie_secure: flag("COOKIE_SECURE"),
            refresh_profile_on_login: flag("REFRESH_PROFILE_ON_LOGIN"),
            cors_origins,
            github,
            google,
        })
    }

    /// Absolute directory where mirrored avatars are written
    pub fn user_image_path(&self) -> PathBuf {
        self.static_dir.join(&self.user_image_dir)
    }
}

/// Reads `{PREFIX}_CLIENT_ID` / `_CLIENT_SECRET` / `_REDIRECT_URL`.
/// A provider without both credentials is left unconfigured.
fn provider_from_lookup<G>(get: &G, prefix: &str, name: &str, base_url: &str) -> Option<ProviderConfig>
where
    G: Fn(&str) -> Option<String>,
{
    let client_id = get(&format!("{}_CLIENT_ID", prefix))?;
    let client_secret = get(&format!("{}_CLIENT_SECRET", prefix))?;
    let redirect_url = get(&format!("{}_REDIRECT_URL", prefix))
        .unwrap_or_else(|| format!("{}/auth/{}/callback", base_url, name));

    Some(ProviderConfig {
        client_id,
        client_secret,
        redirect_url,
        auth_url: String::new(),
        token_url: String::new(),
        profile_url: String::new(),
        scopes: Vec::new(),
    })
}
