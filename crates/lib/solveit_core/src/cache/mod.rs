//! Ephemeral correlation cache.
//!
//! Short-lived key/value entries with per-key TTL, used to correlate the
//! steps of multi-step flows (OAuth2 `state`, one-time exchange codes). Not a
//! system of record.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Correlation cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    #[error("Cache value error: {0}")]
    Value(String),
}

/// Key/value store with per-key TTL.
///
/// `take` must be atomic: of any number of concurrent `take` calls for the
/// same key, at most one returns the value.
#[async_trait]
pub trait CorrelationCache: Send + Sync {
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError>;

    /// Read without consuming. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Remove an entry. Returns whether a live entry was removed.
    async fn delete(&self, key: &str) -> Result<bool, CacheError>;

    /// Remove and return an entry in one step. Expired entries read as absent.
    async fn take(&self, key: &str) -> Result<Option<String>, CacheError>;
}
