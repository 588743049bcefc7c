//! Google OAuth provider

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{get_profile_json, AccessToken, OAuthClient, OAuthProvider, ProviderError};
use crate::auth::models::{ProviderKey, ProviderName, ProviderProfile};
use crate::common::config::ProviderConfig;

/// `oauth2/v2/userinfo` response
#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl GoogleUserInfo {
    fn into_profile(self) -> Result<ProviderProfile, ProviderError> {
        if self.id.trim().is_empty() {
            return Err(ProviderError::Decode("userinfo has an empty id".to_string()));
        }

        // Google accounts have no homepage
        Ok(ProviderProfile {
            key: ProviderKey {
                provider: ProviderName::Google,
                external_id: self.id,
            },
            display_name: self.name.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            avatar_url: self.picture.unwrap_or_default(),
            blog: String::new(),
        })
    }
}

pub struct GoogleProvider {
    oauth: OAuthClient,
    http: Client,
    profile_url: String,
}

impl GoogleProvider {
    pub fn new(config: &ProviderConfig, http: Client) -> Result<Self, ProviderError> {
        Ok(Self {
            oauth: OAuthClient::from_config(config)?,
            http,
            profile_url: config.profile_url.clone(),
        })
    }
}

#[async_trait]
impl OAuthProvider for GoogleProvider {
    fn name(&self) -> ProviderName {
        ProviderName::Google
    }

    fn authorization_url(&self, state: &str) -> String {
        self.oauth.authorization_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<AccessToken, ProviderError> {
        self.oauth.exchange_code(code).await
    }

    async fn fetch_profile(&self, token: &AccessToken) -> Result<ProviderProfile, ProviderError> {
        let info: GoogleUserInfo = get_profile_json(&self.http, &self.profile_url, token).await?;
        info.into_profile()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::config::GOOGLE_PROFILE_SCOPE;
    use reqwest::Url;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(base: &str) -> ProviderConfig {
        ProviderConfig {
            client_id: "g-client".to_string(),
            client_secret: "g-secret".to_string(),
            redirect_url: "http://localhost:8080/auth/google/callback".to_string(),
            auth_url: format!("{}/o/oauth2/v2/auth", base),
            token_url: format!("{}/token", base),
            profile_url: format!("{}/oauth2/v2/userinfo", base),
            scopes: vec![GOOGLE_PROFILE_SCOPE.to_string()],
        }
    }

    #[test]
    fn test_authorization_url_requests_profile_scope() {
        let provider = GoogleProvider::new(&config_for("https://accounts.test"), Client::new()).unwrap();
        let url = Url::parse(&provider.authorization_url("S1")).unwrap();

        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("state".to_string(), "S1".to_string())));
        assert!(pairs.contains(&("scope".to_string(), GOOGLE_PROFILE_SCOPE.to_string())));
        assert!(pairs.contains(&("client_id".to_string(), "g-client".to_string())));
    }

    #[test]
    fn test_userinfo_normalization() {
        let info: GoogleUserInfo = serde_json::from_value(json!({
            "id": "1098",
            "name": "Carol",
            "picture": "https://lh3.test/photo.jpg"
        }))
        .unwrap();

        let profile = info.into_profile().unwrap();
        assert_eq!(profile.key.provider, ProviderName::Google);
        assert_eq!(profile.key.external_id, "1098");
        assert_eq!(profile.display_name, "Carol");
        assert_eq!(profile.email, "");
        assert_eq!(profile.blog, "");
        assert_eq!(profile.avatar_url, "https://lh3.test/photo.jpg");
    }

    #[test]
    fn test_empty_id_is_rejected() {
        let info: GoogleUserInfo = serde_json::from_value(json!({ "id": "" })).unwrap();
        assert!(matches!(info.into_profile(), Err(ProviderError::Decode(_))));
    }

    #[tokio::test]
    async fn test_exchange_and_fetch_profile() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("code=auth-code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "ya29.test",
                "token_type": "Bearer",
                "expires_in": 3599
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/oauth2/v2/userinfo"))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "1098",
                "name": "Carol",
                "picture": "https://lh3.test/photo.jpg"
            })))
            .mount(&server)
            .await;

        let provider = GoogleProvider::new(&config_for(&server.uri()), Client::new()).unwrap();
        let token = provider.exchange_code("auth-code").await.unwrap();
        let profile = provider.fetch_profile(&token).await.unwrap();

        assert_eq!(profile.key.external_id, "1098");
        assert_eq!(profile.display_name, "Carol");
    }

    #[tokio::test]
    async fn test_token_endpoint_unreachable() {
        // Nothing listens on the discard port
        let provider = GoogleProvider::new(&config_for("http://127.0.0.1:9"), Client::new()).unwrap();
        let result = provider.exchange_code("auth-code").await;
        assert!(matches!(result, Err(ProviderError::Exchange(_))));
    }
}
