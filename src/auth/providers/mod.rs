//! Identity provider implementations
//!
//! Each provider module exposes one struct implementing [`OAuthProvider`]:
//! 1. `authorization_url` - where to send the browser, with our state embedded
//! 2. `exchange_code` - trade the one-time authorization code for an access token
//! 3. `fetch_profile` - load the account and normalize it into a [`ProviderProfile`]
//!
//! Adding a provider means adding a [`ProviderName`] variant and a module here.

pub mod github;
pub mod google;

pub use github::GitHubProvider;
pub use google::GoogleProvider;

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::reqwest::async_http_client;
use oauth2::{
    AuthType, AuthUrl, AuthorizationCode, ClientId, ClientSecret, CsrfToken, RedirectUrl, Scope,
    TokenResponse, TokenUrl,
};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::info;

use super::models::{ProviderName, ProviderProfile};
use crate::common::config::{AppConfig, ProviderConfig};

const CLIENT_USER_AGENT: &str = concat!("comment_api/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),

    #[error("Token exchange failed: {0}")]
    Exchange(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Provider responded with status {0}")]
    Status(reqwest::StatusCode),

    #[error("Failed to decode profile: {0}")]
    Decode(String),
}

/// Access token returned by a provider; only lives for one callback
#[derive(Clone)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(***)")
    }
}

/// Capability set shared by all identity providers
#[async_trait]
pub trait OAuthProvider: Send + Sync {
    fn name(&self) -> ProviderName;

    /// Authorization URL embedding `state`
    fn authorization_url(&self, state: &str) -> String;

    /// Exchange an authorization code. Codes are single-use, so this never retries.
    async fn exchange_code(&self, code: &str) -> Result<AccessToken, ProviderError>;

    async fn fetch_profile(&self, token: &AccessToken) -> Result<ProviderProfile, ProviderError>;
}

/// Standard authorization-code client shared by the concrete providers
pub(crate) struct OAuthClient {
    client: BasicClient,
    scopes: Vec<String>,
}

impl OAuthClient {
    pub(crate) fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let auth_url = AuthUrl::new(config.auth_url.clone())
            .map_err(|e| ProviderError::InvalidConfig(format!("auth url: {}", e)))?;
        let token_url = TokenUrl::new(config.token_url.clone())
            .map_err(|e| ProviderError::InvalidConfig(format!("token url: {}", e)))?;
        let redirect_url = RedirectUrl::new(config.redirect_url.clone())
            .map_err(|e| ProviderError::InvalidConfig(format!("redirect url: {}", e)))?;

        let client = BasicClient::new(
            ClientId::new(config.client_id.clone()),
            Some(ClientSecret::new(config.client_secret.clone())),
            auth_url,
            Some(token_url),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(redirect_url);

        Ok(Self {
            client,
            scopes: config.scopes.clone(),
        })
    }

    pub(crate) fn authorization_url(&self, state: &str) -> String {
        let (url, _csrf) = self
            .client
            .authorize_url(|| CsrfToken::new(state.to_string()))
            .add_scopes(self.scopes.iter().cloned().map(Scope::new))
            .url();
        url.to_string()
    }

    pub(crate) async fn exchange_code(&self, code: &str) -> Result<AccessToken, ProviderError> {
        let token = self
            .client
            .exchange_code(AuthorizationCode::new(code.to_string()))
            .request_async(async_http_client)
            .await
            .map_err(|e| ProviderError::Exchange(e.to_string()))?;

        Ok(AccessToken::new(token.access_token().secret().clone()))
    }
}

/// GET a provider profile endpoint with the bearer token and decode the JSON body
pub(crate) async fn get_profile_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    token: &AccessToken,
) -> Result<T, ProviderError> {
    let response = http
        .get(url)
        .bearer_auth(token.secret())
        .header(USER_AGENT, CLIENT_USER_AGENT)
        .header(ACCEPT, "application/json")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::Status(status));
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))
}

/// Configured providers, keyed by name
#[derive(Default)]
pub struct ProviderRegistry {
    providers: HashMap<ProviderName, Arc<dyn OAuthProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every provider that has credentials in `config`
    pub fn from_config(config: &AppConfig, http: Client) -> Result<Self, ProviderError> {
        let mut registry = Self::new();

        if let Some(github) = &config.github {
            registry.register(Arc::new(GitHubProvider::new(github, http.clone())?));
        }
        if let Some(google) = &config.google {
            registry.register(Arc::new(GoogleProvider::new(google, http.clone())?));
        }

        Ok(registry)
    }

    pub fn register(&mut self, provider: Arc<dyn OAuthProvider>) {
        let name = provider.name();
        info!(provider = %name, "Registered identity provider");
        self.providers.insert(name, provider);
    }

    pub fn get(&self, name: ProviderName) -> Option<Arc<dyn OAuthProvider>> {
        self.providers.get(&name).cloned()
    }

    /// Look a provider up by its route name, e.g. `"github"`
    pub fn lookup(&self, name: &str) -> Option<Arc<dyn OAuthProvider>> {
        ProviderName::from_name(name).and_then(|n| self.get(n))
    }

    /// Configured provider names in a stable order
    pub fn names(&self) -> Vec<ProviderName> {
        ProviderName::ALL
            .into_iter()
            .filter(|n| self.providers.contains_key(n))
            .collect()
    }
}
