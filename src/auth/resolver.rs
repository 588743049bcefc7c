//! Maps provider identities onto local users

use sqlx::SqlitePool;
use tracing::{debug, info};

use super::models::{ProviderKey, ProviderProfile, User};

const USER_COLUMNS: &str = "id, name, email, blog, image, github_id, google_id";

#[derive(Debug)]
pub struct Resolved {
    pub user: User,
    /// False when a concurrent login inserted the identity first
    pub created: bool,
    /// Whether `image` ended up on the stored row
    pub image_stored: bool,
}

#[derive(Debug, Clone)]
pub struct IdentityResolver {
    db: SqlitePool,
    refresh_profile_on_login: bool,
}

impl IdentityResolver {
    pub fn new(db: SqlitePool, refresh_profile_on_login: bool) -> Self {
        Self {
            db,
            refresh_profile_on_login,
        }
    }

    /// Whether returning users get their profile fields overwritten
    pub fn refreshes_profile(&self) -> bool {
        self.refresh_profile_on_login
    }

    pub async fn find(&self, key: &ProviderKey) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            "SELECT {} FROM users WHERE {} = ?",
            USER_COLUMNS,
            key.provider.external_id_column()
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&key.external_id)
            .fetch_optional(&self.db)
            .await
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.db)
            .await
    }

    /// Map a provider login onto a local user, creating it on first login
    ///
    /// `existing` is what `find` returned for `profile.key`, `image` the
    /// avatar URL to store, local or remote.
    pub async fn resolve(
        &self,
        existing: Option<User>,
        profile: &ProviderProfile,
        image: &str,
    ) -> Result<Resolved, sqlx::Error> {
        match existing {
            Some(user) => Ok(Resolved {
                user: self.returning(user, profile, image).await?,
                created: false,
                image_stored: self.refresh_profile_on_login,
            }),
            None => self.create(profile, image).await,
        }
    }

    async fn returning(
        &self,
        user: User,
        profile: &ProviderProfile,
        image: &str,
    ) -> Result<User, sqlx::Error> {
        if self.refresh_profile_on_login {
            return self.refresh(user.id, profile, image).await;
        }
        debug!(user_id = %user.id, provider = %profile.key.provider, "Returning user");
        Ok(user)
    }

    /// A concurrent first login may have inserted the identity since `find`;
    /// that row is then treated as a returning login.
    async fn create(&self, profile: &ProviderProfile, image: &str) -> Result<Resolved, sqlx::Error> {
        match self.insert(profile, image).await {
            Ok(user) => {
                info!(
                    user_id = %user.id,
                    provider = %profile.key.provider,
                    "Created user on first login"
                );
                Ok(Resolved {
                    user,
                    created: true,
                    image_stored: true,
                })
            }
            // A concurrent first login for the same identity won the insert
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                debug!(provider = %profile.key.provider, "Lost first-login race, re-reading user");
                let user = self.find(&profile.key).await?.ok_or(sqlx::Error::RowNotFound)?;
                let user = self.returning(user, profile, image).await?;
                Ok(Resolved {
                    user,
                    created: false,
                    image_stored: self.refresh_profile_on_login,
                })
            }
            Err(e) => Err(e),
        }
    }

    async fn insert(&self, profile: &ProviderProfile, image: &str) -> Result<User, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (name, email, blog, image, {}) VALUES (?, ?, ?, ?, ?) RETURNING {}",
            profile.key.provider.external_id_column(),
            USER_COLUMNS
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&profile.display_name)
            .bind(&profile.email)
            .bind(&profile.blog)
            .bind(image)
            .bind(&profile.key.external_id)
            .fetch_one(&self.db)
            .await
    }

    async fn refresh(&self, id: i64, profile: &ProviderProfile, image: &str) -> Result<User, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET name = ?, email = ?, blog = ?, image = ? WHERE id = ? RETURNING {}",
            USER_COLUMNS
        );

        let user = sqlx::query_as::<_, User>(&sql)
            .bind(&profile.display_name)
            .bind(&profile.email)
            .bind(&profile.blog)
            .bind(image)
            .bind(id)
            .fetch_one(&self.db)
            .await?;

        debug!(user_id = %user.id, "Refreshed profile from provider");
        Ok(user)
    }
}
