//! # solveit_core
//!
//! Core authentication domain logic for Solveit: credential lifecycle,
//! stateless tokens, and the OAuth2 bridge.

pub mod auth;
pub mod cache;
pub mod config;
pub mod mail;
pub mod migrate;
pub mod models;
pub mod oauth2;
pub mod store;
pub mod validation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
