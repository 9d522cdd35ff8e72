//! Authentication domain models.
//!
//! These are internal domain models, distinct from the HTTP request/response
//! models in `solveit_api` (which use camelCase on the wire).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::user::User;

/// What a token may be used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenPurpose {
    Access,
    Refresh,
    Confirmation,
    ResetPassword,
}

impl TokenPurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::Access => "access",
            TokenPurpose::Refresh => "refresh",
            TokenPurpose::Confirmation => "confirmation",
            TokenPurpose::ResetPassword => "reset_password",
        }
    }
}

/// Claims shared by every token purpose.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: user ID (standard JWT `sub` claim).
    pub sub: String,
    /// Credential version snapshot at issue time.
    pub ver: i32,
    /// Unique token ID.
    pub jti: String,
    pub iss: String,
    pub aud: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// JWT claims, one variant per purpose.
///
/// The purpose travels inside the signed payload as `"purpose"`, so a token
/// minted for one purpose never decodes as another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "purpose", rename_all = "snake_case")]
pub enum TokenClaims {
    Access(Claims),
    Refresh(Claims),
    Confirmation(Claims),
    ResetPassword(Claims),
}

impl TokenClaims {
    pub fn new(purpose: TokenPurpose, claims: Claims) -> Self {
        match purpose {
            TokenPurpose::Access => TokenClaims::Access(claims),
            TokenPurpose::Refresh => TokenClaims::Refresh(claims),
            TokenPurpose::Confirmation => TokenClaims::Confirmation(claims),
            TokenPurpose::ResetPassword => TokenClaims::ResetPassword(claims),
        }
    }

    pub fn purpose(&self) -> TokenPurpose {
        match self {
            TokenClaims::Access(_) => TokenPurpose::Access,
            TokenClaims::Refresh(_) => TokenPurpose::Refresh,
            TokenClaims::Confirmation(_) => TokenPurpose::Confirmation,
            TokenClaims::ResetPassword(_) => TokenPurpose::ResetPassword,
        }
    }

    pub fn claims(&self) -> &Claims {
        match self {
            TokenClaims::Access(c)
            | TokenClaims::Refresh(c)
            | TokenClaims::Confirmation(c)
            | TokenClaims::ResetPassword(c) => c,
        }
    }

    /// Credential version embedded at issue time.
    pub fn version(&self) -> i32 {
        self.claims().ver
    }

    /// Parsed subject. `None` if the subject is not a user ID.
    pub fn user_id(&self) -> Option<i64> {
        self.claims().sub.parse().ok()
    }
}

/// Principal produced by access-token authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: i64,
    pub version: i32,
}

/// Result of every operation that opens a session.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    /// Access token lifetime in seconds.
    pub expires_in: i64,
}

/// Acknowledgement returned by operations that do not open a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claims() -> Claims {
        Claims {
            sub: "42".into(),
            ver: 3,
            jti: "jti".into(),
            iss: "solveit".into(),
            aud: "solveit-app".into(),
            iat: 1_700_000_000,
            exp: 1_700_000_900,
        }
    }

    #[test]
    fn claims_serialize_with_flat_purpose_tag() {
        let json = serde_json::to_value(TokenClaims::Refresh(claims())).unwrap();
        assert_eq!(json["purpose"], "refresh");
        assert_eq!(json["sub"], "42");
        assert_eq!(json["exp"], 1_700_000_900);
    }

    #[test]
    fn claims_deserialize_by_purpose() {
        let json = serde_json::json!({
            "purpose": "reset_password",
            "sub": "42", "ver": 3, "jti": "jti",
            "iss": "solveit", "aud": "solveit-app",
            "iat": 1_700_000_000, "exp": 1_700_000_900,
        });
        let parsed: TokenClaims = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.purpose(), TokenPurpose::ResetPassword);
        assert_eq!(parsed.user_id(), Some(42));
        assert_eq!(parsed.version(), 3);
    }

    #[test]
    fn unknown_purpose_is_rejected() {
        let json = serde_json::json!({
            "purpose": "admin",
            "sub": "42", "ver": 3, "jti": "jti",
            "iss": "solveit", "aud": "solveit-app",
            "iat": 1_700_000_000, "exp": 1_700_000_900,
        });
        assert!(serde_json::from_value::<TokenClaims>(json).is_err());
    }
}
