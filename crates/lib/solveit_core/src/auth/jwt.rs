//! JWT token generation and verification.
//!
//! Tokens are HS256-signed and self-contained: subject, purpose, credential
//! version, issuer, audience, issue and expiry times. Verification never
//! touches the credential store; callers compare the embedded version with
//! the stored one.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use rand::distr::Alphanumeric;
use rand::{Rng, rng};
use tracing::{debug, info};
use uuid::Uuid;

use super::AuthError;
use crate::config::JwtConfig;
use crate::models::auth::{AuthResult, Claims, TokenClaims, TokenPurpose};
use crate::models::user::User;

/// Signing and verification keys for one purpose.
struct PurposeKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl PurposeKeys {
    fn new(secret: &str, ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl_secs,
        }
    }
}

/// Issues and verifies signed tokens. Holds no mutable state.
pub struct TokenCodec {
    issuer: String,
    audience: String,
    access: PurposeKeys,
    refresh: PurposeKeys,
    confirmation: PurposeKeys,
    reset_password: PurposeKeys,
}

impl TokenCodec {
    pub fn new(config: &JwtConfig) -> Self {
        let keys = |purpose| {
            let c = config.for_purpose(purpose);
            PurposeKeys::new(&c.secret, c.ttl_secs)
        };
        Self {
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            access: keys(TokenPurpose::Access),
            refresh: keys(TokenPurpose::Refresh),
            confirmation: keys(TokenPurpose::Confirmation),
            reset_password: keys(TokenPurpose::ResetPassword),
        }
    }

    fn keys(&self, purpose: TokenPurpose) -> &PurposeKeys {
        match purpose {
            TokenPurpose::Access => &self.access,
            TokenPurpose::Refresh => &self.refresh,
            TokenPurpose::Confirmation => &self.confirmation,
            TokenPurpose::ResetPassword => &self.reset_password,
        }
    }

    /// Lifetime in seconds of tokens minted for `purpose`.
    pub fn expires_in(&self, purpose: TokenPurpose) -> i64 {
        self.keys(purpose).ttl_secs
    }

    /// Mint a token bound to the user's id and current credential version.
    pub fn issue(&self, user: &User, purpose: TokenPurpose) -> Result<String, AuthError> {
        self.issue_at(user.id, user.credentials.version, purpose, Utc::now())
    }

    /// Mint a fresh access + refresh pair for `user`.
    pub fn issue_pair(&self, user: User) -> Result<AuthResult, AuthError> {
        let access_token = self.issue(&user, TokenPurpose::Access)?;
        let refresh_token = self.issue(&user, TokenPurpose::Refresh)?;
        Ok(AuthResult {
            user,
            access_token,
            refresh_token,
            expires_in: self.expires_in(TokenPurpose::Access),
        })
    }

    pub(crate) fn issue_at(
        &self,
        user_id: i64,
        version: i32,
        purpose: TokenPurpose,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let keys = self.keys(purpose);
        let claims = TokenClaims::new(
            purpose,
            Claims {
                sub: user_id.to_string(),
                ver: version,
                jti: Uuid::new_v4().to_string(),
                iss: self.issuer.clone(),
                aud: self.audience.clone(),
                iat: now.timestamp(),
                exp: (now + Duration::seconds(keys.ttl_secs)).timestamp(),
            },
        );
        encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)
            .map_err(|e| AuthError::Internal(format!("jwt encode: {e}")))
    }

    /// Verify signature, issuer, audience, expiry and purpose.
    pub fn verify(&self, token: &str, purpose: TokenPurpose) -> Result<TokenClaims, AuthError> {
        let keys = self.keys(purpose);
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "sub", "iss", "aud"]);

        let claims = decode::<TokenClaims>(token, &keys.decoding, &validation)
            .map_err(|e| {
                debug!(purpose = purpose.as_str(), error = %e, "token rejected");
                AuthError::TokenError("Invalid token".into())
            })?
            .claims;

        if claims.purpose() != purpose {
            debug!(
                expected = purpose.as_str(),
                actual = claims.purpose().as_str(),
                "token purpose mismatch"
            );
            return Err(AuthError::TokenError("Invalid token".into()));
        }
        if claims.user_id().is_none() {
            return Err(AuthError::TokenError("Invalid token".into()));
        }
        Ok(claims)
    }
}

/// Resolve the JWT secret: env var `JWT_SECRET` → `AUTH_SECRET` → persisted file.
pub fn resolve_jwt_secret() -> String {
    if let Ok(secret) = std::env::var("JWT_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    if let Ok(secret) = std::env::var("AUTH_SECRET")
        && !secret.is_empty()
    {
        return secret;
    }
    let secret_path = jwt_secret_path();
    if let Ok(existing) = std::fs::read_to_string(&secret_path) {
        let trimmed = existing.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    let secret: String = rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    if let Some(parent) = secret_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let _ = std::fs::write(&secret_path, &secret);
    info!(path = %secret_path.display(), "generated new JWT secret");
    secret
}

/// Path to the persisted JWT secret file.
fn jwt_secret_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("solveit")
        .join("jwt-secret")
}
