//! Authentication middleware: Bearer token extraction and version-aware
//! access-token verification.

use axum::http::header::AUTHORIZATION;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;

/// Axum middleware: extracts `Authorization: Bearer <token>`, verifies it
/// against the current credential version, and injects
/// [`solveit_core::models::auth::AuthenticatedUser`] into request extensions.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Unauthorized("Invalid authorization scheme".into()))?;

    let principal = state.auth.authenticate(token).await.map_err(|e| {
        debug!(error = %e, "access token rejected");
        AppError::from(e)
    })?;

    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}
