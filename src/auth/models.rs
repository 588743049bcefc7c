//! Authentication data models

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::fmt;

/// Identity providers a visitor can sign in with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderName {
    Github,
    Google,
}

impl ProviderName {
    pub const ALL: [ProviderName; 2] = [ProviderName::Github, ProviderName::Google];

    /// Name used in routes and in persisted state rows
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderName::Github => "github",
            ProviderName::Google => "google",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "github" => Some(ProviderName::Github),
            "google" => Some(ProviderName::Google),
            _ => None,
        }
    }

    /// Human readable label for login links
    pub fn label(&self) -> &'static str {
        match self {
            ProviderName::Github => "GitHub",
            ProviderName::Google => "Google",
        }
    }

    /// `users` column holding this provider's external id
    pub fn external_id_column(&self) -> &'static str {
        match self {
            ProviderName::Github => "github_id",
            ProviderName::Google => "google_id",
        }
    }
}

impl fmt::Display for ProviderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider's own immutable identifier for an account
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProviderKey {
    pub provider: ProviderName,
    pub external_id: String,
}

/// Normalized identity returned by a provider. Never persisted as-is.
#[derive(Debug, Clone)]
pub struct ProviderProfile {
    pub key: ProviderKey,
    pub display_name: String,
    pub email: String,
    pub avatar_url: String,
    pub blog: String,
}

/// User database model
#[derive(FromRow, Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub blog: String,
    pub image: String,
    pub github_id: Option<String>,
    pub google_id: Option<String>,
}

/// One-time authorization state row
#[derive(FromRow, Debug, Clone)]
pub struct AuthState {
    pub state: String,
    pub provider: String,
    pub back_url: String,
    /// Unix milliseconds
    pub issued_at: i64,
}

/// Query parameters of `GET /auth/:provider`
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub b: Option<String>,
}

/// Query parameters of `GET /auth/:provider/callback`
#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Query parameters of `GET /logout`
#[derive(Debug, Deserialize)]
pub struct LogoutQuery {
    pub b: Option<String>,
}
