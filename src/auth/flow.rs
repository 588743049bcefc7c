//! Login flow orchestration
//!
//! A login moves through: state issued and browser redirected, code exchanged
//! for a token, profile fetched, avatar mirrored, user resolved, session bound.
//! Binding the session is always the last step, so a flow that fails or is
//! dropped part way leaves the visitor signed out.

use reqwest::Url;
use tracing::{debug, info, warn};

use super::ledger::{LedgerError, StateLedger};
use super::models::{ProviderProfile, User};
use super::providers::{ProviderError, ProviderRegistry};
use super::resolver::IdentityResolver;
use super::session::{SessionError, SessionIssuer};
use crate::common::safe_token_log;
use crate::services::AvatarMirror;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Invalid or already used login state")]
    Forged,

    #[error("Login state expired")]
    TimedOut,

    #[error("Token exchange failed: {0}")]
    UpstreamAuth(#[source] ProviderError),

    #[error("Profile fetch failed: {0}")]
    UpstreamProfile(#[source] ProviderError),

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error(transparent)]
    Session(#[from] SessionError),
}

impl From<LedgerError> for AuthError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound => AuthError::Forged,
            LedgerError::Expired => AuthError::TimedOut,
            LedgerError::Storage(e) => AuthError::Storage(e),
        }
    }
}

/// Successful callback result
#[derive(Debug)]
pub struct CallbackOutcome {
    pub user: User,
    pub return_url: String,
}

pub struct AuthFlow {
    ledger: StateLedger,
    registry: ProviderRegistry,
    mirror: AvatarMirror,
    resolver: IdentityResolver,
}

impl AuthFlow {
    pub fn new(
        ledger: StateLedger,
        registry: ProviderRegistry,
        mirror: AvatarMirror,
        resolver: IdentityResolver,
    ) -> Self {
        Self {
            ledger,
            registry,
            mirror,
            resolver,
        }
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// Begin a login, returning the provider URL to redirect the browser to
    pub async fn start(&self, provider_name: &str, return_url: &str) -> Result<String, AuthError> {
        let provider = self
            .registry
            .lookup(provider_name)
            .ok_or_else(|| AuthError::UnknownProvider(provider_name.to_string()))?;

        validate_return_url(return_url)?;

        let state = self.ledger.issue(provider.name(), return_url).await?;

        info!(
            provider = %provider.name(),
            state = %safe_token_log(&state),
            "Starting OAuth login"
        );

        Ok(provider.authorization_url(&state))
    }

    /// Complete a login from the provider's redirect
    pub async fn callback<S>(
        &self,
        provider_name: &str,
        code: &str,
        state: &str,
        session: &S,
    ) -> Result<CallbackOutcome, AuthError>
    where
        S: SessionIssuer + ?Sized,
    {
        let provider = self
            .registry
            .lookup(provider_name)
            .ok_or_else(|| AuthError::UnknownProvider(provider_name.to_string()))?;

        if state.is_empty() {
            return Err(AuthError::Forged);
        }
        if code.is_empty() {
            return Err(AuthError::BadRequest("Missing authorization code".to_string()));
        }

        let record = self.ledger.consume(state).await?;
        if record.provider != provider.name().as_str() {
            warn!(
                issued_for = %record.provider,
                presented_to = %provider.name(),
                state = %safe_token_log(&record.state),
                "OAuth state presented to the wrong provider"
            );
            return Err(AuthError::Forged);
        }

        let token = provider
            .exchange_code(code)
            .await
            .map_err(AuthError::UpstreamAuth)?;

        let profile = provider
            .fetch_profile(&token)
            .await
            .map_err(AuthError::UpstreamProfile)?;

        let user = self.resolve_user(&profile).await?;

        session.bind_user(user.id).await?;

        info!(
            user_id = %user.id,
            provider = %provider.name(),
            "User signed in"
        );

        Ok(CallbackOutcome {
            user,
            return_url: record.back_url,
        })
    }

    async fn resolve_user(&self, profile: &ProviderProfile) -> Result<User, AuthError> {
        // Returning users keep their stored avatar unless profiles refresh
        let existing = match self.resolver.find(&profile.key).await? {
            Some(user) if !self.resolver.refreshes_profile() => return Ok(user),
            existing => existing,
        };

        let image = self.mirror_avatar(&profile.avatar_url).await;
        let resolved = match self.resolver.resolve(existing, profile, &image).await {
            Ok(resolved) => resolved,
            Err(e) => {
                self.mirror.discard(&image).await;
                return Err(e.into());
            }
        };

        if !resolved.image_stored {
            debug!(
                user_id = %resolved.user.id,
                created = resolved.created,
                "Avatar copy not stored, discarding"
            );
            self.mirror.discard(&image).await;
        }
        Ok(resolved.user)
    }

    /// Local copy of the avatar, or the remote URL when mirroring fails
    async fn mirror_avatar(&self, remote_url: &str) -> String {
        if remote_url.is_empty() {
            return String::new();
        }

        match self.mirror.mirror(remote_url).await {
            Ok(local) => local,
            Err(e) => {
                warn!(error = %e, avatar_url = %remote_url, "Avatar mirror failed, keeping remote URL");
                remote_url.to_string()
            }
        }
    }
}

/// Only same-site paths and plain http(s) URLs may be returned to
pub fn validate_return_url(url: &str) -> Result<(), AuthError> {
    if url.trim().is_empty() {
        return Err(AuthError::BadRequest("Missing return URL".to_string()));
    }

    if url.starts_with('/') {
        // Protocol-relative; browsers also treat "/\" like "//"
        if url.starts_with("//") || url.starts_with("/\\") {
            return Err(AuthError::BadRequest(
                "Protocol-relative return URLs are not allowed".to_string(),
            ));
        }
        return Ok(());
    }

    let parsed = Url::parse(url)
        .map_err(|_| AuthError::BadRequest("Return URL is not a valid URL".to_string()))?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(AuthError::BadRequest(format!(
            "Return URL scheme '{}' is not allowed",
            parsed.scheme()
        )));
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(AuthError::BadRequest(
            "Return URLs with credentials are not allowed".to_string(),
        ));
    }

    Ok(())
}
