//! OAuth2 authorization-code bridge.
//!
//! Three legs: an authorization URL carrying a cached CSRF `state`, the
//! provider callback (code exchange, user-info fetch, account lookup or
//! creation), and redemption of a one-time exchange code for this system's
//! own token pair. Only the opaque exchange code and an access token travel
//! through the browser redirect; the refresh token never does.

pub mod providers;
pub mod transport;

use std::sync::Arc;

use base64::Engine;
use rand::distr::Alphanumeric;
use rand::{Rng, RngCore, rng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::auth::AuthError;
use crate::auth::jwt::TokenCodec;
use crate::cache::CorrelationCache;
use crate::config::{OAuthClientConfig, OAuthConfig};
use crate::models::auth::{AuthResult, TokenPurpose};
use crate::models::user::{NewUser, OAuthProvider, User};
use crate::store::{CredentialStore, StoreError, generate_username};
use crate::validation::{NAME_MAX, format_name, normalize_email, validate_email};

use self::providers::{IdentityProvider, ProviderProfile, identity_provider};
use self::transport::{OAuthTransport, TokenRequest};

/// Length of the one-time exchange code.
pub const EXCHANGE_CODE_LEN: usize = 22;

const STATE_PREFIX: &str = "oauth_state:";
const CODE_PREFIX: &str = "oauth_code:";

/// Generate a CSRF state parameter (URL-safe).
pub fn generate_state() -> String {
    let mut bytes = [0u8; 24];
    rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate an opaque exchange code.
pub fn generate_exchange_code() -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(EXCHANGE_CODE_LEN)
        .map(char::from)
        .collect()
}

/// Query parameters delivered to the provider callback.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: String,
    pub state: String,
}

/// Outcome of a successful callback, handed to the frontend by redirect.
#[derive(Debug, Clone)]
pub struct CallbackResult {
    pub code: String,
    pub access_token: String,
    pub expires_in: i64,
}

/// What an exchange code redeems to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ExchangeEntry {
    user_id: i64,
    provider: OAuthProvider,
}

pub struct OAuthBridge {
    config: OAuthConfig,
    cache: Arc<dyn CorrelationCache>,
    store: Arc<dyn CredentialStore>,
    codec: Arc<TokenCodec>,
    transport: Arc<dyn OAuthTransport>,
}

impl OAuthBridge {
    pub fn new(
        config: OAuthConfig,
        cache: Arc<dyn CorrelationCache>,
        store: Arc<dyn CredentialStore>,
        codec: Arc<TokenCodec>,
        transport: Arc<dyn OAuthTransport>,
    ) -> Self {
        Self {
            config,
            cache,
            store,
            codec,
            transport,
        }
    }

    pub fn is_enabled(&self, provider: OAuthProvider) -> bool {
        self.enabled(provider).is_ok()
    }

    fn enabled(
        &self,
        provider: OAuthProvider,
    ) -> Result<(&'static dyn IdentityProvider, &OAuthClientConfig), AuthError> {
        identity_provider(provider)
            .zip(self.config.client(provider))
            .ok_or_else(|| AuthError::NotFound(format!("OAuth2 is not enabled for {provider}")))
    }

    /// Build the provider authorization URL and remember its `state`.
    pub async fn authorization_url(&self, provider: OAuthProvider) -> Result<String, AuthError> {
        let (idp, client) = self.enabled(provider)?;

        let state = generate_state();
        self.cache
            .set(
                &format!("{STATE_PREFIX}{state}"),
                provider.as_str().to_string(),
                self.config.state_ttl,
            )
            .await?;

        let mut url = Url::parse(idp.authorize_url())
            .map_err(|e| AuthError::Internal(format!("authorize url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &client.client_id)
            .append_pair("redirect_uri", &self.config.provider_redirect_uri(provider))
            .append_pair("scope", &idp.scopes().join(" "))
            .append_pair("state", &state);

        debug!(%provider, "authorization url issued");
        Ok(url.into())
    }

    /// Complete the provider leg: consume `state`, exchange the code, fetch
    /// the profile, sign the user in and mint an exchange code.
    pub async fn callback(
        &self,
        provider: OAuthProvider,
        params: CallbackParams,
    ) -> Result<CallbackResult, AuthError> {
        let (idp, client) = self.enabled(provider)?;

        let stored = self
            .cache
            .take(&format!("{STATE_PREFIX}{}", params.state))
            .await?;
        if stored.as_deref() != Some(provider.as_str()) {
            debug!(%provider, "unknown or expired oauth state");
            return Err(AuthError::Unauthorized("Invalid state".into()));
        }

        let redirect_uri = self.config.provider_redirect_uri(provider);
        let provider_token = self
            .transport
            .exchange_code(
                idp.token_url(),
                TokenRequest {
                    code: &params.code,
                    client_id: &client.client_id,
                    client_secret: &client.client_secret,
                    redirect_uri: &redirect_uri,
                },
            )
            .await?;
        let body = self
            .transport
            .fetch_user_info(idp.user_info_url(), &provider_token)
            .await?;
        let profile = idp.parse_user_info(body)?;

        let user = self.find_or_create(provider, profile).await?;

        let code = generate_exchange_code();
        let entry = serde_json::to_string(&ExchangeEntry {
            user_id: user.id,
            provider,
        })
        .map_err(|e| AuthError::Internal(format!("exchange entry: {e}")))?;
        self.cache
            .set(&format!("{CODE_PREFIX}{code}"), entry, self.config.code_ttl)
            .await?;

        Ok(CallbackResult {
            code,
            access_token: self.codec.issue(&user, TokenPurpose::Access)?,
            expires_in: self.codec.expires_in(TokenPurpose::Access),
        })
    }

    /// Frontend URL the callback redirects the browser to.
    pub fn callback_redirect(&self, result: &CallbackResult) -> Result<String, AuthError> {
        let mut url = Url::parse(&self.config.frontend_callback_url())
            .map_err(|e| AuthError::Internal(format!("frontend url: {e}")))?;
        url.query_pairs_mut()
            .append_pair("code", &result.code)
            .append_pair("accessToken", &result.access_token)
            .append_pair("tokenType", "Bearer")
            .append_pair("expiresIn", &result.expires_in.to_string());
        Ok(url.into())
    }

    /// Redeem an exchange code for a full token pair. The code is consumed
    /// whether or not redemption succeeds.
    pub async fn token(
        &self,
        code: &str,
        redirect_uri: &str,
        user_id: i64,
    ) -> Result<AuthResult, AuthError> {
        if code.is_empty() || code.len() > EXCHANGE_CODE_LEN {
            return Err(AuthError::ValidationError("Invalid code".into()));
        }
        if redirect_uri != self.config.frontend_callback_url() {
            debug!(user_id, "exchange rejected: redirect uri mismatch");
            return Err(AuthError::Unauthorized("Invalid redirect URI".into()));
        }

        let raw = self
            .cache
            .take(&format!("{CODE_PREFIX}{code}"))
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Invalid code".into()))?;
        let entry: ExchangeEntry = serde_json::from_str(&raw)
            .map_err(|e| AuthError::Internal(format!("exchange entry: {e}")))?;
        if entry.user_id != user_id {
            debug!(user_id, owner = entry.user_id, "exchange code owned by another user");
            return Err(AuthError::Unauthorized("Invalid code".into()));
        }

        let user = self
            .store
            .find_user_by_id(user_id)
            .await?
            .ok_or_else(|| AuthError::Unauthorized("Invalid code".into()))?;
        info!(user_id, provider = %entry.provider, "oauth sign-in completed");
        self.codec.issue_pair(user)
    }

    /// Link to the account owning the asserted email, or create a confirmed
    /// federated account.
    async fn find_or_create(
        &self,
        provider: OAuthProvider,
        profile: ProviderProfile,
    ) -> Result<User, AuthError> {
        let email = normalize_email(&profile.email);
        validate_email(&email)?;

        if let Some(user) = self.store.find_user_by_email(&email).await? {
            return self.link(user, provider).await;
        }

        let mut name = format_name(&profile.name);
        if name.is_empty() {
            name = email.clone();
        }
        let name = provider_display_name(&name);

        let mut retried = false;
        loop {
            let username = generate_username(self.store.as_ref(), &name).await?;
            let created = self
                .store
                .create_user(NewUser {
                    name: name.clone(),
                    username,
                    email: email.clone(),
                    password_hash: None,
                    confirmed: true,
                    provider,
                })
                .await;

            match created {
                Ok(user) => {
                    info!(user_id = user.id, %provider, "federated user created");
                    return Ok(user);
                }
                // a concurrent callback created the account first
                Err(StoreError::Conflict(field)) if field == "Email" => {
                    let user = self
                        .store
                        .find_user_by_email(&email)
                        .await?
                        .ok_or_else(|| AuthError::Conflict("Email already in use".into()))?;
                    return self.link(user, provider).await;
                }
                // a concurrent sign-up took the generated username
                Err(StoreError::Conflict(field)) if field == "Username" && !retried => {
                    debug!(%provider, "generated username taken, retrying");
                    retried = true;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn link(&self, user: User, provider: OAuthProvider) -> Result<User, AuthError> {
        if user.confirmed {
            if self.store.add_provider(user.id, provider).await? {
                info!(user_id = user.id, %provider, "provider linked");
            }
            return Ok(user);
        }
        // an unconfirmed local password was never proven; it is dropped
        let user = self.store.confirm_with_provider(user.id, provider).await?;
        info!(user_id = user.id, %provider, "unconfirmed account claimed by provider");
        Ok(user)
    }
}

/// Provider display names are clipped to what the store accepts.
fn provider_display_name(name: &str) -> String {
    name.chars()
        .take(NAME_MAX)
        .collect::<String>()
        .trim_end()
        .to_string()
}
