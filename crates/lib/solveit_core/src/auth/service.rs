//! Session and credential manager.
//!
//! Local sign-up/sign-in, confirmation, password lifecycle and logout. Every
//! token-consuming operation cross-checks the token's credential version
//! against the stored one, so bumping the version revokes every token issued
//! before it.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::AuthError;
use super::jwt::TokenCodec;
use super::password::{hash_password, verify_password};
use crate::config::AuthConfig;
use crate::mail::Mailer;
use crate::models::auth::{AuthResult, AuthenticatedUser, Message, TokenClaims, TokenPurpose};
use crate::models::user::{NewUser, OAuthProvider, ProviderLink, User};
use crate::store::{CredentialStore, generate_username};
use crate::validation::{
    format_name, normalize_email, passwords_match, validate_email, validate_name,
    validate_password,
};

pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    mailer: Arc<dyn Mailer>,
    codec: Arc<TokenCodec>,
    config: AuthConfig,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        mailer: Arc<dyn Mailer>,
        codec: Arc<TokenCodec>,
        config: AuthConfig,
    ) -> Self {
        Self {
            store,
            mailer,
            codec,
            config,
        }
    }

    pub fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    /// Register a local account. The account stays unconfirmed until the
    /// emailed confirmation token is redeemed.
    pub async fn sign_up(
        &self,
        name: &str,
        email: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<Message, AuthError> {
        passwords_match(password, confirmation)?;
        validate_name(name)?;
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        if self.store.find_user_by_email(&email).await?.is_some() {
            debug!("sign-up rejected: email in use");
            return Err(AuthError::Conflict("Email already in use".into()));
        }

        let name = format_name(name);
        let username = generate_username(self.store.as_ref(), &name).await?;
        let password_hash = hash_password(password, self.config.bcrypt_cost)?;
        let user = self
            .store
            .create_user(NewUser {
                name,
                username,
                email,
                password_hash: Some(password_hash),
                confirmed: false,
                provider: OAuthProvider::Local,
            })
            .await?;

        info!(user_id = user.id, username = %user.username, "user registered");
        self.send_confirmation(&user).await;
        Ok(Message::new("Registration successful"))
    }

    /// Authenticate with email or username plus password.
    pub async fn sign_in(&self, identifier: &str, password: &str) -> Result<AuthResult, AuthError> {
        let user = self
            .find_by_identifier(identifier)
            .await?
            .ok_or(AuthError::CredentialError)?;

        let hash = user
            .password_hash
            .as_deref()
            .ok_or(AuthError::CredentialError)?;
        if !verify_password(password, hash) {
            debug!(user_id = user.id, "sign-in rejected: bad password");
            return Err(AuthError::CredentialError);
        }

        if !user.confirmed {
            debug!(user_id = user.id, "sign-in rejected: unconfirmed");
            self.send_confirmation(&user).await;
            return Err(AuthError::Unconfirmed);
        }

        info!(user_id = user.id, "user signed in");
        self.codec.issue_pair(user)
    }

    /// Exchange a refresh token for a new token pair. The presented token
    /// stays valid until the credential version changes.
    pub async fn refresh_access(&self, refresh_token: &str) -> Result<AuthResult, AuthError> {
        let claims = self.codec.verify(refresh_token, TokenPurpose::Refresh)?;
        let user = self.current_user(&claims).await?;
        self.codec.issue_pair(user)
    }

    /// Revoke every outstanding token of the refresh token's owner.
    pub async fn logout(&self, refresh_token: &str) -> Result<Message, AuthError> {
        let claims = self.codec.verify(refresh_token, TokenPurpose::Refresh)?;
        let user = self.current_user(&claims).await?;
        let user = self.store.bump_credentials_version(user.id).await?;
        info!(user_id = user.id, version = user.credentials.version, "user logged out");
        Ok(Message::new("Logout successful"))
    }

    /// Redeem a confirmation token and open a session. A token issued to an
    /// already-confirmed account (address change) is accepted the same way;
    /// the version bump makes every confirmation token single-use.
    pub async fn confirm_email(&self, token: &str) -> Result<AuthResult, AuthError> {
        let claims = self.codec.verify(token, TokenPurpose::Confirmation)?;
        let user = self.current_user(&claims).await?;
        let user = self.store.confirm_user(user.id).await?;
        info!(user_id = user.id, "email confirmed");
        self.codec.issue_pair(user)
    }

    /// Send a reset link if the address belongs to an account. The answer
    /// is the same either way.
    pub async fn reset_password_email(&self, email: &str) -> Result<Message, AuthError> {
        let email = normalize_email(email);
        match self.store.find_user_by_email(&email).await? {
            Some(user) => match self.codec.issue(&user, TokenPurpose::ResetPassword) {
                Ok(token) => {
                    if let Err(e) = self.mailer.send_reset_password_email(&user, &token).await {
                        warn!(user_id = user.id, error = %e, "reset password email failed");
                    }
                }
                Err(e) => warn!(user_id = user.id, error = %e, "reset token not issued"),
            },
            None => debug!("reset requested for unknown email"),
        }
        Ok(Message::new("Password reset email sent"))
    }

    /// Set a new password from a reset token. Revokes all prior tokens,
    /// the reset token included.
    pub async fn reset_password(
        &self,
        token: &str,
        password: &str,
        confirmation: &str,
    ) -> Result<AuthResult, AuthError> {
        passwords_match(password, confirmation)?;
        validate_password(password)?;
        let claims = self.codec.verify(token, TokenPurpose::ResetPassword)?;
        let user = self.current_user(&claims).await?;

        let hash = hash_password(password, self.config.bcrypt_cost)?;
        let user = self.store.set_password(user.id, &hash).await?;
        info!(user_id = user.id, "password reset");
        self.codec.issue_pair(user)
    }

    /// Change the password of an authenticated user.
    pub async fn update_password(
        &self,
        user_id: i64,
        old_password: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<AuthResult, AuthError> {
        passwords_match(new_password, confirmation)?;
        if new_password == old_password {
            return Err(AuthError::ValidationError(
                "New password must be different".into(),
            ));
        }
        validate_password(new_password)?;

        let user = self.authenticated_user(user_id).await?;
        let Some(current) = user.password_hash.as_deref() else {
            return Err(AuthError::ValidationError(
                "No password set, add one first".into(),
            ));
        };
        if !verify_password(old_password, current) {
            return Err(AuthError::Unauthorized("Wrong password".into()));
        }

        let hash = hash_password(new_password, self.config.bcrypt_cost)?;
        let user = self.store.set_password(user.id, &hash).await?;
        info!(user_id = user.id, "password updated");
        self.codec.issue_pair(user)
    }

    /// Attach a local password to an account that only has federated links.
    pub async fn add_local_credential(
        &self,
        user_id: i64,
        password: &str,
        confirmation: &str,
    ) -> Result<AuthResult, AuthError> {
        passwords_match(password, confirmation)?;
        validate_password(password)?;

        let user = self.authenticated_user(user_id).await?;
        if user.password_hash.is_some() {
            return Err(AuthError::ValidationError("Password already set".into()));
        }

        let hash = hash_password(password, self.config.bcrypt_cost)?;
        let user = self.store.set_password(user.id, &hash).await?;
        if self.store.add_provider(user.id, OAuthProvider::Local).await? {
            info!(user_id = user.id, provider = "local", "provider linked");
        }
        self.codec.issue_pair(user)
    }

    /// Verify an access token and check it against the stored version.
    pub async fn authenticate(&self, access_token: &str) -> Result<AuthenticatedUser, AuthError> {
        let claims = self.codec.verify(access_token, TokenPurpose::Access)?;
        let user = self.current_user(&claims).await?;
        Ok(AuthenticatedUser {
            user_id: user.id,
            version: user.credentials.version,
        })
    }

    pub async fn me(&self, user_id: i64) -> Result<User, AuthError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::NotFound("User not found".into()))
    }

    pub async fn providers(&self, user_id: i64) -> Result<Vec<ProviderLink>, AuthError> {
        Ok(self.store.find_providers(user_id).await?)
    }

    /// Delete the account. Accounts with a local password must present it.
    pub async fn delete_account(
        &self,
        user_id: i64,
        password: Option<&str>,
    ) -> Result<Message, AuthError> {
        let user = self.authenticated_user(user_id).await?;
        if let Some(hash) = user.password_hash.as_deref() {
            let ok = password.is_some_and(|p| verify_password(p, hash));
            if !ok {
                return Err(AuthError::Unauthorized("Wrong password".into()));
            }
        }
        self.store.delete_user(user.id).await?;
        info!(user_id = user.id, "account deleted");
        Ok(Message::new("Account deleted"))
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<User>, AuthError> {
        let identifier = identifier.trim();
        let user = if identifier.contains('@') {
            self.store
                .find_user_by_email(&normalize_email(identifier))
                .await?
        } else {
            self.store
                .find_user_by_username(&identifier.to_lowercase())
                .await?
        };
        Ok(user)
    }

    /// The user a token refers to, provided its credential version is current.
    async fn current_user(&self, claims: &TokenClaims) -> Result<User, AuthError> {
        let user_id = claims
            .user_id()
            .ok_or_else(|| AuthError::TokenError("Invalid token".into()))?;
        self.store
            .find_user_by_credentials(user_id, claims.version())
            .await?
            .ok_or_else(|| {
                debug!(user_id, purpose = claims.purpose().as_str(), "stale token");
                AuthError::Unauthorized("Invalid token".into())
            })
    }

    /// Load the user behind an already-verified access token.
    async fn authenticated_user(&self, user_id: i64) -> Result<User, AuthError> {
        self.store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Invalid token".into()))
    }

    async fn send_confirmation(&self, user: &User) {
        let token = match self.codec.issue(user, TokenPurpose::Confirmation) {
            Ok(token) => token,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "confirmation token not issued");
                return;
            }
        };
        if let Err(e) = self.mailer.send_confirmation_email(user, &token).await {
            warn!(user_id = user.id, error = %e, "confirmation email failed");
        }
    }
}
