//! PostgreSQL credential store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::{CredentialStore, StoreError};
use crate::models::user::{Credentials, NewUser, OAuthProvider, ProviderLink, User};

const USER_COLUMNS: &str = "id, name, username, email, password_hash, confirmed, \
     credentials_version, credentials_last_password, credentials_password_updated_at, \
     credentials_updated_at, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    name: String,
    username: String,
    email: String,
    password_hash: Option<String>,
    confirmed: bool,
    credentials_version: i32,
    credentials_last_password: String,
    credentials_password_updated_at: DateTime<Utc>,
    credentials_updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            confirmed: row.confirmed,
            credentials: Credentials {
                version: row.credentials_version,
                last_password: row.credentials_last_password,
                password_updated_at: row.credentials_password_updated_at,
                updated_at: row.credentials_updated_at,
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Translate uniqueness violations; everything else stays a database error.
fn map_write_error(e: sqlx::Error) -> StoreError {
    if let Some(db) = e.as_database_error()
        && db.is_unique_violation()
    {
        let field = match db.constraint() {
            Some("users_username_unique") => "Username",
            _ => "Email",
        };
        return StoreError::Conflict(field.into());
    }
    // 22003: numeric_value_out_of_range
    if let Some(db) = e.as_database_error()
        && db.code().as_deref() == Some("22003")
    {
        return StoreError::Overflow;
    }
    StoreError::Db(e)
}

fn parse_provider(value: &str) -> Result<OAuthProvider, StoreError> {
    value
        .parse()
        .map_err(|e| StoreError::Db(sqlx::Error::Decode(Box::new(e))))
}

/// Credential store backed by the `users` and `oauth_providers` tables.
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run an `UPDATE users SET … WHERE id = $1 RETURNING …` statement.
    async fn update_returning(&self, assignments: &str, id: i64) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE users SET {assignments}, updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .map(User::from)
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl CredentialStore for PgCredentialStore {
    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_user_by_credentials(
        &self,
        id: i64,
        version: i32,
    ) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND credentials_version = $2"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(version)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(User::from))
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO users (name, username, email, password_hash, confirmed) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        );
        let row = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&new_user.name)
            .bind(&new_user.username)
            .bind(&new_user.email)
            .bind(new_user.password_hash.as_deref())
            .bind(new_user.confirmed)
            .fetch_one(&mut *tx)
            .await
            .map_err(map_write_error)?;

        sqlx::query("INSERT INTO oauth_providers (provider, user_id) VALUES ($1, $2)")
            .bind(new_user.provider.as_str())
            .bind(row.id)
            .execute(&mut *tx)
            .await
            .map_err(map_write_error)?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn confirm_user(&self, id: i64) -> Result<User, StoreError> {
        self.update_returning(
            "confirmed = TRUE, credentials_version = credentials_version + 1, \
             credentials_updated_at = now()",
            id,
        )
        .await
    }

    async fn confirm_with_provider(
        &self,
        id: i64,
        provider: OAuthProvider,
    ) -> Result<User, StoreError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "UPDATE users SET \
               confirmed = TRUE, \
               password_hash = NULL, \
               credentials_version = credentials_version + 1, \
               credentials_updated_at = now(), \
               updated_at = now() \
             WHERE id = $1 AND confirmed = FALSE RETURNING {USER_COLUMNS}"
        );
        let claimed = sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(map_write_error)?;

        let row = match claimed {
            Some(row) => {
                sqlx::query("DELETE FROM oauth_providers WHERE user_id = $1 AND provider = 'local'")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                row
            }
            None => {
                let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1 FOR UPDATE");
                sqlx::query_as::<_, UserRow>(&sql)
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?
                    .ok_or(StoreError::NotFound)?
            }
        };

        sqlx::query(
            "INSERT INTO oauth_providers (provider, user_id) VALUES ($1, $2) \
             ON CONFLICT (provider, user_id) DO NOTHING",
        )
        .bind(provider.as_str())
        .bind(id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn bump_credentials_version(&self, id: i64) -> Result<User, StoreError> {
        self.update_returning(
            "credentials_version = credentials_version + 1, credentials_updated_at = now()",
            id,
        )
        .await
    }

    async fn set_password(&self, id: i64, password_hash: &str) -> Result<User, StoreError> {
        let sql = format!(
            "UPDATE users SET \
               credentials_last_password = COALESCE(password_hash, ''), \
               password_hash = $2, \
               credentials_version = credentials_version + 1, \
               credentials_password_updated_at = now(), \
               credentials_updated_at = now(), \
               updated_at = now() \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .bind(password_hash)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_write_error)?
            .map(User::from)
            .ok_or(StoreError::NotFound)
    }

    async fn delete_user(&self, id: i64) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn add_provider(
        &self,
        user_id: i64,
        provider: OAuthProvider,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query(
            "INSERT INTO oauth_providers (provider, user_id) VALUES ($1, $2) \
             ON CONFLICT (provider, user_id) DO NOTHING",
        )
        .bind(provider.as_str())
        .bind(user_id)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            // 23503: foreign_key_violation
            let missing_user = e
                .as_database_error()
                .and_then(|d| d.code())
                .is_some_and(|code| code == "23503");
            if missing_user {
                StoreError::NotFound
            } else {
                StoreError::Db(e)
            }
        })?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_providers(&self, user_id: i64) -> Result<Vec<ProviderLink>, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64, DateTime<Utc>, DateTime<Utc>)>(
            "SELECT provider, user_id, created_at, updated_at \
             FROM oauth_providers WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(provider, user_id, created_at, updated_at)| {
                Ok(ProviderLink {
                    provider: parse_provider(&provider)?,
                    user_id,
                    created_at,
                    updated_at,
                })
            })
            .collect()
    }
}
