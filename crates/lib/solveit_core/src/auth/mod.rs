//! Authentication and credential lifecycle.
//!
//! Provides password hashing, the stateless token codec, and the session
//! manager that ties them to the credential store.

pub mod jwt;
pub mod password;
pub mod service;

use thiserror::Error;

use crate::cache::CacheError;
use crate::store::StoreError;

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Unknown identifier or wrong password. One message for both.
    #[error("Invalid credentials")]
    CredentialError,

    #[error("Please confirm your email, a new email has been sent")]
    Unconfirmed,

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Token error: {0}")]
    TokenError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => AuthError::Conflict(format!("{what} already in use")),
            StoreError::NotFound => AuthError::NotFound("User not found".into()),
            other => AuthError::ServiceError(other.to_string()),
        }
    }
}

impl From<CacheError> for AuthError {
    fn from(e: CacheError) -> Self {
        AuthError::ServiceError(e.to_string())
    }
}
