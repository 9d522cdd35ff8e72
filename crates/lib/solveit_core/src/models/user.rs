//! User and provider-link domain models.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity provider a user can authenticate with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OAuthProvider {
    Local,
    Google,
    Facebook,
}

impl OAuthProvider {
    /// Wire and database representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            OAuthProvider::Local => "local",
            OAuthProvider::Google => "google",
            OAuthProvider::Facebook => "facebook",
        }
    }
}

impl fmt::Display for OAuthProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown provider name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownProvider(pub String);

impl fmt::Display for UnknownProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown provider '{}'", self.0)
    }
}

impl std::error::Error for UnknownProvider {}

impl FromStr for OAuthProvider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(OAuthProvider::Local),
            "google" => Ok(OAuthProvider::Google),
            "facebook" => Ok(OAuthProvider::Facebook),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

/// Credential bookkeeping embedded in every user.
///
/// `version` is snapshotted into every issued token; bumping it revokes all
/// tokens issued before the bump.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub version: i32,
    /// Hash of the password replaced by the most recent password change.
    pub last_password: String,
    pub password_updated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Credentials {
    /// Fresh credentials at version 0.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            version: 0,
            last_password: String::new(),
            password_updated_at: now,
            updated_at: now,
        }
    }
}

/// Domain user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub username: String,
    pub email: String,
    /// `None` for federated-only accounts that never set a local password.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub confirmed: bool,
    #[serde(skip_serializing)]
    pub credentials: Credentials,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Values required to create a user together with its first provider link.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub confirmed: bool,
    pub provider: OAuthProvider,
}

/// Association between a user and one identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderLink {
    pub provider: OAuthProvider,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_parses_wire_names() {
        assert_eq!("google".parse::<OAuthProvider>(), Ok(OAuthProvider::Google));
        assert_eq!(
            "facebook".parse::<OAuthProvider>(),
            Ok(OAuthProvider::Facebook)
        );
        assert_eq!("local".parse::<OAuthProvider>(), Ok(OAuthProvider::Local));
        assert!("github".parse::<OAuthProvider>().is_err());
    }

    #[test]
    fn provider_serializes_lowercase() {
        let json = serde_json::to_string(&OAuthProvider::Facebook).unwrap();
        assert_eq!(json, "\"facebook\"");
    }

    #[test]
    fn user_serialization_hides_secrets() {
        let now = Utc::now();
        let user = User {
            id: 1,
            name: "Jane Doe".into(),
            username: "jane.doe".into(),
            email: "jane@example.com".into(),
            password_hash: Some("$2b$04$hash".into()),
            confirmed: true,
            credentials: Credentials::new(now),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert!(json.get("credentials").is_none());
        assert_eq!(json["username"], "jane.doe");
    }
}
