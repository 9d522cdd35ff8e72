//! In-memory credential store.
//!
//! A single `RwLock` guards users and provider links together, so every
//! operation is atomic with respect to every other.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use super::{CredentialStore, StoreError};
use crate::models::user::{Credentials, NewUser, OAuthProvider, ProviderLink, User};

#[derive(Default)]
struct Tables {
    next_id: i64,
    users: HashMap<i64, User>,
    providers: Vec<ProviderLink>,
}

impl Tables {
    fn user_mut(&mut self, id: i64) -> Result<&mut User, StoreError> {
        self.users.get_mut(&id).ok_or(StoreError::NotFound)
    }
}

/// Credential store kept entirely in process memory.
#[derive(Default)]
pub struct MemoryCredentialStore {
    tables: RwLock<Tables>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored users.
    pub async fn user_count(&self) -> usize {
        self.tables.read().await.users.len()
    }

    /// Number of stored provider links across all users.
    pub async fn provider_count(&self) -> usize {
        self.tables.read().await.providers.len()
    }
}

fn bump(user: &mut User) -> Result<(), StoreError> {
    let now = Utc::now();
    user.credentials.version = user
        .credentials
        .version
        .checked_add(1)
        .ok_or(StoreError::Overflow)?;
    user.credentials.updated_at = now;
    user.updated_at = now;
    Ok(())
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_by_credentials(
        &self,
        id: i64,
        version: i32,
    ) -> Result<Option<User>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .get(&id)
            .filter(|u| u.credentials.version == version)
            .cloned())
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("Email".into()));
        }
        if tables.users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Conflict("Username".into()));
        }

        tables.next_id += 1;
        let now = Utc::now();
        let user = User {
            id: tables.next_id,
            name: new_user.name,
            username: new_user.username,
            email: new_user.email,
            password_hash: new_user.password_hash,
            confirmed: new_user.confirmed,
            credentials: Credentials::new(now),
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(user.id, user.clone());
        tables.providers.push(ProviderLink {
            provider: new_user.provider,
            user_id: user.id,
            created_at: now,
            updated_at: now,
        });
        Ok(user)
    }

    async fn confirm_user(&self, id: i64) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;
        bump(user)?;
        user.confirmed = true;
        Ok(user.clone())
    }

    async fn confirm_with_provider(
        &self,
        id: i64,
        provider: OAuthProvider,
    ) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;
        let claimed = !user.confirmed;
        if claimed {
            bump(user)?;
            user.confirmed = true;
            user.password_hash = None;
        }
        let user = user.clone();
        if claimed {
            tables
                .providers
                .retain(|p| !(p.user_id == id && p.provider == OAuthProvider::Local));
        }
        if !tables
            .providers
            .iter()
            .any(|p| p.user_id == id && p.provider == provider)
        {
            let now = Utc::now();
            tables.providers.push(ProviderLink {
                provider,
                user_id: id,
                created_at: now,
                updated_at: now,
            });
        }
        Ok(user)
    }

    async fn bump_credentials_version(&self, id: i64) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;
        bump(user)?;
        Ok(user.clone())
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<User, StoreError> {
        let mut tables = self.tables.write().await;
        let user = tables.user_mut(id)?;
        bump(user)?;
        user.credentials.last_password = user.password_hash.take().unwrap_or_default();
        user.credentials.password_updated_at = user.credentials.updated_at;
        user.password_hash = Some(password_hash.to_string());
        Ok(user.clone())
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.users.remove(&id).is_none() {
            return Err(StoreError::NotFound);
        }
        tables.providers.retain(|p| p.user_id != id);
        Ok(())
    }

    async fn add_provider(
        &self,
        user_id: i64,
        provider: OAuthProvider,
    ) -> Result<bool, StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&user_id) {
            return Err(StoreError::NotFound);
        }
        if tables
            .providers
            .iter()
            .any(|p| p.user_id == user_id && p.provider == provider)
        {
            return Ok(false);
        }
        let now = Utc::now();
        tables.providers.push(ProviderLink {
            provider,
            user_id,
            created_at: now,
            updated_at: now,
        });
        Ok(true)
    }

    async fn find_providers(&self, user_id: i64) -> Result<Vec<ProviderLink>, StoreError> {
        let tables = self.tables.read().await;
        Ok(tables
            .providers
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }
}
