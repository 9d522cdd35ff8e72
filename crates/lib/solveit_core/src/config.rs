//! Immutable configuration for the token codec, session manager and OAuth2
//! bridge.
//!
//! Built once at startup and passed into constructors.

use std::time::Duration;

use crate::auth::jwt::resolve_jwt_secret;
use crate::models::auth::TokenPurpose;
use crate::models::user::OAuthProvider;

/// Access token lifetime: 15 minutes.
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 15 * 60;

/// Refresh token lifetime: 7 days.
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// Confirmation token lifetime: 1 hour.
pub const DEFAULT_CONFIRMATION_TTL_SECS: i64 = 60 * 60;

/// Reset-password token lifetime: 30 minutes.
pub const DEFAULT_RESET_TTL_SECS: i64 = 30 * 60;

/// TTL for OAuth2 state and exchange-code entries.
pub const DEFAULT_CORRELATION_TTL: Duration = Duration::from_secs(120);

/// Provider HTTP request timeout.
pub const DEFAULT_PROVIDER_TIMEOUT: Duration = Duration::from_secs(5);

/// bcrypt cost factor.
pub const DEFAULT_BCRYPT_COST: u32 = 10;

/// Signing secret and lifetime for one token purpose.
#[derive(Clone, Debug)]
pub struct TokenTypeConfig {
    pub secret: String,
    pub ttl_secs: i64,
}

/// Token codec configuration.
#[derive(Clone, Debug)]
pub struct JwtConfig {
    pub issuer: String,
    pub audience: String,
    pub access: TokenTypeConfig,
    pub refresh: TokenTypeConfig,
    pub confirmation: TokenTypeConfig,
    pub reset_password: TokenTypeConfig,
}

impl JwtConfig {
    /// Same secret for every purpose, default lifetimes.
    pub fn with_secret(secret: &str) -> Self {
        let token = |ttl_secs| TokenTypeConfig {
            secret: secret.to_string(),
            ttl_secs,
        };
        Self {
            issuer: "solveit".into(),
            audience: "solveit-app".into(),
            access: token(DEFAULT_ACCESS_TTL_SECS),
            refresh: token(DEFAULT_REFRESH_TTL_SECS),
            confirmation: token(DEFAULT_CONFIRMATION_TTL_SECS),
            reset_password: token(DEFAULT_RESET_TTL_SECS),
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// | Variable                    | Default                              |
    /// |-----------------------------|--------------------------------------|
    /// | `JWT_SECRET` / `AUTH_SECRET`| generated & persisted to file        |
    /// | `JWT_<PURPOSE>_SECRET`      | the shared secret                    |
    /// | `JWT_<PURPOSE>_TIME`        | per-purpose default (seconds)        |
    /// | `JWT_ISSUER`                | `solveit`                            |
    /// | `JWT_AUDIENCE`              | `solveit-app`                        |
    ///
    /// `<PURPOSE>` is one of `ACCESS`, `REFRESH`, `CONFIRMATION`, `RESET`.
    pub fn from_env() -> Self {
        let shared = resolve_jwt_secret();
        let token = |name: &str, default_ttl: i64| TokenTypeConfig {
            secret: env_non_empty(&format!("JWT_{name}_SECRET")).unwrap_or_else(|| shared.clone()),
            ttl_secs: env_non_empty(&format!("JWT_{name}_TIME"))
                .and_then(|v| v.parse().ok())
                .filter(|v: &i64| *v > 0)
                .unwrap_or(default_ttl),
        };
        Self {
            issuer: env_non_empty("JWT_ISSUER").unwrap_or_else(|| "solveit".into()),
            audience: env_non_empty("JWT_AUDIENCE").unwrap_or_else(|| "solveit-app".into()),
            access: token("ACCESS", DEFAULT_ACCESS_TTL_SECS),
            refresh: token("REFRESH", DEFAULT_REFRESH_TTL_SECS),
            confirmation: token("CONFIRMATION", DEFAULT_CONFIRMATION_TTL_SECS),
            reset_password: token("RESET", DEFAULT_RESET_TTL_SECS),
        }
    }

    pub fn for_purpose(&self, purpose: TokenPurpose) -> &TokenTypeConfig {
        match purpose {
            TokenPurpose::Access => &self.access,
            TokenPurpose::Refresh => &self.refresh,
            TokenPurpose::Confirmation => &self.confirmation,
            TokenPurpose::ResetPassword => &self.reset_password,
        }
    }
}

/// Client credentials registered with one identity provider.
#[derive(Clone, Debug)]
pub struct OAuthClientConfig {
    pub client_id: String,
    pub client_secret: String,
}

/// OAuth2 bridge configuration.
#[derive(Clone, Debug)]
pub struct OAuthConfig {
    /// Public base URL of this API (provider redirect URIs hang off it).
    pub api_url: String,
    /// Public base URL of the client app (receives the exchange code).
    pub frontend_url: String,
    pub google: Option<OAuthClientConfig>,
    pub facebook: Option<OAuthClientConfig>,
    pub state_ttl: Duration,
    pub code_ttl: Duration,
    pub http_timeout: Duration,
}

impl OAuthConfig {
    /// Bridge configuration with no providers enabled.
    pub fn new(api_url: &str, frontend_url: &str) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            google: None,
            facebook: None,
            state_ttl: DEFAULT_CORRELATION_TTL,
            code_ttl: DEFAULT_CORRELATION_TTL,
            http_timeout: DEFAULT_PROVIDER_TIMEOUT,
        }
    }

    /// Reads configuration from environment variables.
    ///
    /// `API_URL` and `FRONTEND_URL` default to `https://$DOMAIN`
    /// (`DOMAIN` defaults to `localhost:3000`). A provider is enabled only
    /// when both `<PROVIDER>_CLIENT_ID` and `<PROVIDER>_CLIENT_SECRET` are set.
    pub fn from_env() -> Self {
        let domain = env_non_empty("DOMAIN").unwrap_or_else(|| "localhost:3000".into());
        let base = format!("https://{domain}");
        let api_url = env_non_empty("API_URL").unwrap_or_else(|| base.clone());
        let frontend_url = env_non_empty("FRONTEND_URL").unwrap_or(base);
        let secs = |name: &str, default: Duration| {
            env_non_empty(name)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(default)
        };

        let mut config = Self::new(&api_url, &frontend_url);
        config.google = client_from_env("GOOGLE");
        config.facebook = client_from_env("FACEBOOK");
        config.state_ttl = secs("OAUTH_STATE_TTL", DEFAULT_CORRELATION_TTL);
        config.code_ttl = secs("OAUTH_CODE_TTL", DEFAULT_CORRELATION_TTL);
        config.http_timeout = secs("OAUTH_HTTP_TIMEOUT", DEFAULT_PROVIDER_TIMEOUT);
        config
    }

    /// Client credentials for an enabled provider.
    pub fn client(&self, provider: OAuthProvider) -> Option<&OAuthClientConfig> {
        match provider {
            OAuthProvider::Google => self.google.as_ref(),
            OAuthProvider::Facebook => self.facebook.as_ref(),
            OAuthProvider::Local => None,
        }
    }

    /// Redirect URI registered with the provider.
    pub fn provider_redirect_uri(&self, provider: OAuthProvider) -> String {
        format!("{}/api/auth/ext/{provider}/callback", self.api_url)
    }

    /// Client-side URL that receives the exchange code.
    pub fn frontend_callback_url(&self) -> String {
        format!("{}/auth/callback", self.frontend_url)
    }
}

/// Session manager configuration.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: DEFAULT_BCRYPT_COST,
        }
    }
}

impl AuthConfig {
    /// Reads `BCRYPT_COST`, falling back to the default.
    pub fn from_env() -> Self {
        Self {
            bcrypt_cost: env_non_empty("BCRYPT_COST")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_BCRYPT_COST),
        }
    }
}

fn client_from_env(prefix: &str) -> Option<OAuthClientConfig> {
    let client_id = env_non_empty(&format!("{prefix}_CLIENT_ID"))?;
    let client_secret = env_non_empty(&format!("{prefix}_CLIENT_SECRET"))?;
    Some(OAuthClientConfig {
        client_id,
        client_secret,
    })
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
