//! Refresh-token cookie: signed, httpOnly, scoped to the auth routes.

use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, Key, SameSite, SignedCookieJar};
use sha2::{Digest, Sha512};
use time::Duration;

use crate::config::ApiConfig;
use crate::error::{AppError, AppResult};
use crate::routes::AUTH_COOKIE_PATH;

/// Derive the 64-byte cookie signing key from a configured secret.
pub fn signing_key(secret: &str) -> Key {
    Key::from(Sha512::digest(secret.as_bytes()).as_slice())
}

/// Build the refresh-token cookie.
pub fn refresh_cookie(config: &ApiConfig, token: &str) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), token.to_string()))
        .http_only(true)
        .secure(!config.testing)
        .same_site(SameSite::Lax)
        .path(AUTH_COOKIE_PATH)
        .max_age(Duration::seconds(config.refresh_max_age()))
        .build()
}

/// Build an expired cookie that clears the refresh token.
pub fn clear_refresh_cookie(config: &ApiConfig) -> Cookie<'static> {
    Cookie::build((config.cookie_name.clone(), String::new()))
        .http_only(true)
        .secure(!config.testing)
        .same_site(SameSite::Lax)
        .path(AUTH_COOKIE_PATH)
        .max_age(Duration::ZERO)
        .build()
}

/// Refresh token from the signed cookie, falling back to the request body.
/// A refresh cookie that is present but fails signature verification is
/// rejected outright.
pub fn refresh_token_from(
    raw: &CookieJar,
    jar: &SignedCookieJar,
    config: &ApiConfig,
    body_token: Option<String>,
) -> AppResult<Option<String>> {
    let sent = raw
        .get(&config.cookie_name)
        .is_some_and(|c| !c.value().is_empty());
    let verified = jar
        .get(&config.cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty());
    if sent && verified.is_none() {
        return Err(AppError::Unauthorized("Invalid refresh cookie".into()));
    }
    Ok(verified.or(body_token).filter(|v| !v.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use solveit_core::config::{AuthConfig, JwtConfig, OAuthConfig};

    fn config(testing: bool) -> ApiConfig {
        ApiConfig {
            bind_addr: "127.0.0.1:0".into(),
            database_url: String::new(),
            cookie_name: "solveit_refresh".into(),
            cookie_secret: "cookie-secret".into(),
            testing,
            jwt: JwtConfig::with_secret("test-secret"),
            oauth: OAuthConfig::new("http://localhost", "http://localhost"),
            auth: AuthConfig::default(),
        }
    }

    #[test]
    fn refresh_cookie_is_scoped_and_http_only() {
        let cookie = refresh_cookie(&config(false), "tok");
        assert_eq!(cookie.name(), "solveit_refresh");
        assert_eq!(cookie.path(), Some("/api/auth"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.max_age(), Some(Duration::days(7)));
    }

    #[test]
    fn testing_mode_drops_secure_flag() {
        assert_eq!(refresh_cookie(&config(true), "tok").secure(), Some(false));
    }

    #[test]
    fn body_token_is_used_without_cookie() {
        let cfg = config(true);
        let raw = CookieJar::new();
        let jar = SignedCookieJar::new(signing_key(&cfg.cookie_secret));
        assert_eq!(
            refresh_token_from(&raw, &jar, &cfg, Some("from-body".into()))
                .unwrap()
                .as_deref(),
            Some("from-body")
        );
        assert!(refresh_token_from(&raw, &jar, &cfg, None).unwrap().is_none());
    }

    #[test]
    fn signed_cookie_wins_over_body() {
        let cfg = config(true);
        let raw = CookieJar::new().add(Cookie::new("solveit_refresh", "signed-value"));
        let jar = SignedCookieJar::new(signing_key(&cfg.cookie_secret))
            .add(refresh_cookie(&cfg, "from-cookie"));
        assert_eq!(
            refresh_token_from(&raw, &jar, &cfg, Some("from-body".into()))
                .unwrap()
                .as_deref(),
            Some("from-cookie")
        );
    }

    #[test]
    fn unverifiable_cookie_is_rejected_even_with_body_token() {
        let cfg = config(true);
        let raw = CookieJar::new().add(Cookie::new("solveit_refresh", "forged"));
        let jar = SignedCookieJar::new(signing_key(&cfg.cookie_secret));
        let err = refresh_token_from(&raw, &jar, &cfg, Some("from-body".into())).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
