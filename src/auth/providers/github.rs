//! GitHub OAuth provider

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{get_profile_json, AccessToken, OAuthClient, OAuthProvider, ProviderError};
use crate::auth::models::{ProviderKey, ProviderName, ProviderProfile};
use crate::common::config::ProviderConfig;

/// Subset of `GET /user` we care about
#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: i64,
    login: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
    #[serde(default)]
    blog: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

impl GitHubUser {
    /// GitHub shows the login, not the free-form name, so we do too.
    /// An empty blog falls back to the profile page.
    fn into_profile(self) -> ProviderProfile {
        let blog = match self.blog.filter(|b| !b.trim().is_empty()) {
            Some(blog) => blog,
            None => self
                .html_url
                .unwrap_or_else(|| format!("https://github.com/{}", self.login)),
        };

        ProviderProfile {
            key: ProviderKey {
                provider: ProviderName::Github,
                external_id: self.id.to_string(),
            },
            display_name: self.login,
            email: self.email.unwrap_or_default(),
            avatar_url: self.avatar_url.unwrap_or_default(),
            blog,
        }
    }
}

pub struct GitHubProvider {
    oauth: OAuthClient,
    http: Client,
    profile_url: String,
}

impl GitHubProvider {
    pub fn new(config: &ProviderConfig, http: Client) -> Result<Self, ProviderError> {
        Ok(Self {
            oauth: OAuthClient::from_config(config)?,
            http,
            profile_url: config.profile_url.clone(),
        })
    }
}

#[async_trait]
impl OAuthProvider for GitHubProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Github
    }

    fn authorization_url(&self, state: &str) -> String {
        self.oauth.authorization_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken, ProviderError> {
        self.oauth.exchange_code(code).await
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<ProviderProfile, ProviderError> {
        let user: GitHubUser = get_profile_json(&self.http, &self.profile_url, token).await?;
        Ok(user.into_profile())
    }
}
