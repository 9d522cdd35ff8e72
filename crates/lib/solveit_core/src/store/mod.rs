//! Credential store: persistence of users and their provider links.
//!
//! The session manager and OAuth2 bridge only see the [`CredentialStore`]
//! trait. [`postgres::PgCredentialStore`] is the production implementation;
//! [`memory::MemoryCredentialStore`] backs tests and local runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::user::{NewUser, OAuthProvider, ProviderLink, User};
use crate::validation::point_slug;

/// Credential store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A uniqueness constraint was violated; carries the offending field.
    #[error("{0} already in use")]
    Conflict(String),

    #[error("User not found")]
    NotFound,

    #[error("Credential version overflow")]
    Overflow,

    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Persistence operations required by the auth core.
///
/// Every mutation that changes `credentials.version` is a single atomic
/// increment on the user row; concurrent readers observe either the old or
/// the new version, never anything else.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError>;

    /// Lookup by normalized (lowercase) email.
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Lookup that only matches while the credential version is unchanged.
    async fn find_user_by_credentials(
        &self,
        id: i64,
        version: i32,
    ) -> Result<Option<User>, StoreError>;

    /// Insert the user and its first provider link atomically.
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError>;

    /// Mark the email confirmed and bump the credential version.
    async fn confirm_user(&self, id: i64) -> Result<User, StoreError>;

    /// Confirm an account on an identity provider's word. If the account
    /// is still unconfirmed, its unverified password and `local` link are
    /// dropped and the credential version bumped. `provider` is linked
    /// either way. One atomic step.
    async fn confirm_with_provider(
        &self,
        id: i64,
        provider: OAuthProvider,
    ) -> Result<User, StoreError>;

    /// Increment the credential version by one.
    async fn bump_credentials_version(&self, id: i64) -> Result<User, StoreError>;

    /// Replace the password hash, remember the previous one, and bump the
    /// credential version.
    async fn set_password(&self, id: i64, password_hash: &str) -> Result<User, StoreError>;

    /// Delete the user; provider links cascade.
    async fn delete_user(&self, id: i64) -> Result<(), StoreError>;

    /// Link a provider. Returns `false` if the link already existed.
    async fn add_provider(&self, user_id: i64, provider: OAuthProvider)
    -> Result<bool, StoreError>;

    async fn find_providers(&self, user_id: i64) -> Result<Vec<ProviderLink>, StoreError>;
}

/// Derive a free username from a display name.
///
/// The slug itself is tried first, then the slug with the smallest numeric
/// suffix not yet taken (`jane.doe`, `jane.doe1`, `jane.doe2`, …).
pub async fn generate_username(
    store: &dyn CredentialStore,
    name: &str,
) -> Result<String, StoreError> {
    let mut base = point_slug(name);
    if base.is_empty() {
        base = "user".into();
    }
    if store.find_user_by_username(&base).await?.is_none() {
        return Ok(base);
    }
    let mut suffix: u32 = 1;
    loop {
        let candidate = format!("{base}{suffix}");
        if store.find_user_by_username(&candidate).await?.is_none() {
            return Ok(candidate);
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryCredentialStore;
    use super::*;

    fn new_user(name: &str, username: String, email: &str) -> NewUser {
        NewUser {
            name: name.into(),
            username,
            email: email.into(),
            password_hash: None,
            confirmed: false,
            provider: OAuthProvider::Local,
        }
    }

    #[tokio::test]
    async fn username_collisions_get_numeric_suffixes() {
        let store = MemoryCredentialStore::new();

        let first = generate_username(&store, "Jane Doe").await.unwrap();
        assert_eq!(first, "jane.doe");
        store
            .create_user(new_user("Jane Doe", first, "jane1@example.com"))
            .await
            .unwrap();

        let second = generate_username(&store, "Jane Doe").await.unwrap();
        assert_eq!(second, "jane.doe1");
        store
            .create_user(new_user("Jane Doe", second, "jane2@example.com"))
            .await
            .unwrap();

        let third = generate_username(&store, "jane doe").await.unwrap();
        assert_eq!(third, "jane.doe2");
    }

    #[tokio::test]
    async fn unsluggable_names_fall_back() {
        let store = MemoryCredentialStore::new();
        assert_eq!(generate_username(&store, "!!!").await.unwrap(), "user");
    }
}
