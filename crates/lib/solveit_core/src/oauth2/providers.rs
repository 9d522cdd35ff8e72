//! Identity provider endpoints, scopes and profile parsing.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::auth::AuthError;
use crate::models::user::OAuthProvider;

/// Identity asserted by a provider's user-info endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub email: String,
    pub name: String,
}

/// Capabilities of one external identity provider.
pub trait IdentityProvider: Send + Sync {
    fn kind(&self) -> OAuthProvider;
    fn authorize_url(&self) -> &'static str;
    fn token_url(&self) -> &'static str;
    fn user_info_url(&self) -> &'static str;
    fn scopes(&self) -> &'static [&'static str];
    fn parse_user_info(&self, body: serde_json::Value) -> Result<ProviderProfile, AuthError>;
}

/// Provider implementation for `provider`. `None` for `local`.
pub fn identity_provider(provider: OAuthProvider) -> Option<&'static dyn IdentityProvider> {
    match provider {
        OAuthProvider::Google => Some(&Google),
        OAuthProvider::Facebook => Some(&Facebook),
        OAuthProvider::Local => None,
    }
}

fn decode<T: DeserializeOwned>(
    provider: OAuthProvider,
    body: serde_json::Value,
) -> Result<T, AuthError> {
    serde_json::from_value(body).map_err(|e| {
        debug!(%provider, error = %e, "unreadable user info");
        AuthError::Unauthorized("Invalid provider response".into())
    })
}

/// Build a profile; a missing display name falls back to the email's local
/// part.
fn profile(email: Option<String>, name: Option<String>) -> Result<ProviderProfile, AuthError> {
    let email = email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| AuthError::Unauthorized("Provider did not share an email".into()))?;
    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());
    Ok(ProviderProfile { email, name })
}

pub struct Google;

#[derive(Deserialize)]
struct GoogleUser {
    email: Option<String>,
    name: Option<String>,
}

impl IdentityProvider for Google {
    fn kind(&self) -> OAuthProvider {
        OAuthProvider::Google
    }

    fn authorize_url(&self) -> &'static str {
        "https://accounts.google.com/o/oauth2/v2/auth"
    }

    fn token_url(&self) -> &'static str {
        "https://www.googleapis.com/oauth2/v4/token"
    }

    fn user_info_url(&self) -> &'static str {
        "https://www.googleapis.com/oauth2/v3/userinfo"
    }

    fn scopes(&self) -> &'static [&'static str] {
        &[
            "https://www.googleapis.com/auth/userinfo.email",
            "https://www.googleapis.com/auth/userinfo.profile",
        ]
    }

    fn parse_user_info(&self, body: serde_json::Value) -> Result<ProviderProfile, AuthError> {
        let user: GoogleUser = decode(self.kind(), body)?;
        profile(user.email, user.name)
    }
}

pub struct Facebook;

#[derive(Deserialize)]
struct FacebookUser {
    email: Option<String>,
    name: Option<String>,
}

impl IdentityProvider for Facebook {
    fn kind(&self) -> OAuthProvider {
        OAuthProvider::Facebook
    }

    fn authorize_url(&self) -> &'static str {
        "https://facebook.com/v9.0/dialog/oauth"
    }

    fn token_url(&self) -> &'static str {
        "https://graph.facebook.com/v9.0/oauth/access_token"
    }

    fn user_info_url(&self) -> &'static str {
        "https://graph.facebook.com/v16.0/me?fields=email,name"
    }

    fn scopes(&self) -> &'static [&'static str] {
        &["email", "public_profile"]
    }

    fn parse_user_info(&self, body: serde_json::Value) -> Result<ProviderProfile, AuthError> {
        let user: FacebookUser = decode(self.kind(), body)?;
        profile(user.email, user.name)
    }
}
