//! One-time OAuth state ledger
//!
//! Every login attempt gets a random state token that is persisted together
//! with the page the visitor should return to. The callback must present the
//! token within [`STATE_TTL_MS`] of issuance, and a token is deleted the first
//! time it is looked up, so it can succeed at most once.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::models::{AuthState, ProviderName};
use crate::common::{generate_state_token, safe_token_log};

/// States older than five minutes are rejected
pub const STATE_TTL_MS: i64 = 5 * 60 * 1000;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("State token not found")]
    NotFound,

    #[error("State token expired")]
    Expired,

    #[error("Database error: {0}")]
    Storage(#[from] sqlx::Error),
}

#[derive(Debug, Clone)]
pub struct StateLedger {
    db: SqlitePool,
    ttl_ms: i64,
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

impl StateLedger {
    pub fn new(db: SqlitePool) -> Self {
        Self {
            db,
            ttl_ms: STATE_TTL_MS,
        }
    }

    /// Issue a fresh state token for a login started at `back_url`
    pub async fn issue(&self, provider: ProviderName, back_url: &str) -> Result<String, LedgerError> {
        self.issue_at(provider, back_url, now_ms()).await
    }

    pub(crate) async fn issue_at(
        &self,
        provider: ProviderName,
        back_url: &str,
        issued_at: i64,
    ) -> Result<String, LedgerError> {
        let token = generate_state_token();

        sqlx::query(
            "INSERT INTO auth_states (state, provider, back_url, issued_at) VALUES (?, ?, ?, ?)",
        )
        .bind(&token)
        .bind(provider.as_str())
        .bind(back_url)
        .bind(issued_at)
        .execute(&self.db)
        .await?;

        debug!(
            state = %safe_token_log(&token),
            provider = %provider,
            "Issued OAuth state"
        );

        Ok(token)
    }

    /// Take a state token out of the ledger
    ///
    /// The row is deleted whether or not it is still fresh. Two callers racing
    /// on the same token cannot both see it; the loser gets `NotFound`.
    pub async fn consume(&self, token: &str) -> Result<AuthState, LedgerError> {
        self.consume_at(token, now_ms()).await
    }

    pub(crate) async fn consume_at(&self, token: &str, now: i64) -> Result<AuthState, LedgerError> {
        let row: Option<AuthState> = sqlx::query_as(
            "DELETE FROM auth_states WHERE state = ? RETURNING state, provider, back_url, issued_at",
        )
        .bind(token)
        .fetch_optional(&self.db)
        .await?;

        let row = row.ok_or(LedgerError::NotFound)?;

        let age_ms = now - row.issued_at;
        if age_ms > self.ttl_ms {
            debug!(
                state = %safe_token_log(token),
                age_ms = age_ms,
                "OAuth state expired"
            );
            return Err(LedgerError::Expired);
        }

        Ok(row)
    }

    /// Delete every state older than the validity window
    pub async fn purge_expired(&self) -> Result<u64, LedgerError> {
        self.purge_expired_at(now_ms()).await
    }

    pub(crate) async fn purge_expired_at(&self, now: i64) -> Result<u64, LedgerError> {
        let result = sqlx::query("DELETE FROM auth_states WHERE issued_at < ?")
            .bind(now - self.ttl_ms)
            .execute(&self.db)
            .await?;

        let removed = result.rows_affected();
        if removed > 0 {
            info!(removed = removed, "Purged expired OAuth states");
        }
        Ok(removed)
    }

    /// Periodically purge expired states in the background
    pub fn start_cleanup_task(self, every: std::time::Duration) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            loop {
                interval.tick().await;
                if let Err(e) = self.purge_expired().await {
                    tracing::warn!(error = %e, "Failed to purge expired OAuth states");
                }
            }
        });
    }
}
