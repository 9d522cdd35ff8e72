//! Request handlers.

pub mod auth;
pub mod oauth;

use axum::Json;
use axum::body::Bytes;
use axum_extra::extract::SignedCookieJar;
use serde::de::DeserializeOwned;
use solveit_core::models::auth::AuthResult;

use crate::AppState;
use crate::error::AppError;
use crate::models::AuthResponse;
use crate::services::cookies::refresh_cookie;

/// Session-opening response: refresh cookie plus the JSON auth body.
pub(crate) fn session_response(
    state: &AppState,
    jar: SignedCookieJar,
    result: AuthResult,
) -> (SignedCookieJar, Json<AuthResponse>) {
    let jar = jar.add(refresh_cookie(&state.config, &result.refresh_token));
    (jar, Json(result.into()))
}

/// Parse a JSON body that may be absent altogether.
pub(crate) fn optional_json<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| AppError::Validation(format!("Invalid body: {e}")))
}
