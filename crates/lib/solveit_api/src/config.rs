//! API server configuration.

use solveit_core::config::{AuthConfig, JwtConfig, OAuthConfig};

/// Default name of the refresh-token cookie.
pub const DEFAULT_REFRESH_COOKIE: &str = "solveit_refresh";

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    /// Address to bind the HTTP listener (e.g. "127.0.0.1:3100").
    pub bind_addr: String,
    /// PostgreSQL connection URL.
    pub database_url: String,
    /// Name of the signed refresh-token cookie.
    pub cookie_name: String,
    /// Secret the cookie signing key is derived from.
    pub cookie_secret: String,
    /// Test mode: cookies are sent without the `Secure` flag.
    pub testing: bool,
    pub jwt: JwtConfig,
    pub oauth: OAuthConfig,
    pub auth: AuthConfig,
}

impl ApiConfig {
    /// Reads configuration from environment variables with sensible defaults.
    ///
    /// | Variable         | Default                              |
    /// |------------------|--------------------------------------|
    /// | `BIND_ADDR`      | `127.0.0.1:3100`                     |
    /// | `DATABASE_URL`   | `postgres://localhost:5432/solveit`  |
    /// | `REFRESH_COOKIE` | `solveit_refresh`                    |
    /// | `COOKIE_SECRET`  | the refresh token secret             |
    /// | `TESTING`        | `false`                              |
    ///
    /// Token, OAuth2 and hashing settings come from [`JwtConfig::from_env`],
    /// [`OAuthConfig::from_env`] and [`AuthConfig::from_env`].
    pub fn from_env() -> Self {
        let jwt = JwtConfig::from_env();
        Self {
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:3100".into()),
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "postgres://localhost:5432/solveit".into()),
            cookie_name: std::env::var("REFRESH_COOKIE")
                .unwrap_or_else(|_| DEFAULT_REFRESH_COOKIE.into()),
            cookie_secret: std::env::var("COOKIE_SECRET")
                .unwrap_or_else(|_| jwt.refresh.secret.clone()),
            testing: std::env::var("TESTING")
                .map(|v| matches!(v.as_str(), "1" | "true"))
                .unwrap_or(false),
            jwt,
            oauth: OAuthConfig::from_env(),
            auth: AuthConfig::from_env(),
        }
    }

    /// Refresh cookie lifetime in seconds; matches the refresh token.
    pub fn refresh_max_age(&self) -> i64 {
        self.jwt.refresh.ttl_secs
    }
}
