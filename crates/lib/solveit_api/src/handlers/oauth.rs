//! OAuth2 bridge handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::http::header::LOCATION;
use axum::response::{IntoResponse, Response};
use axum::{Extension, Json};
use axum_extra::extract::SignedCookieJar;
use solveit_core::models::auth::AuthenticatedUser;
use solveit_core::models::user::OAuthProvider;
use solveit_core::oauth2::CallbackParams;

use super::session_response;
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{AuthResponse, AuthorizationUrlResponse, ExchangeTokenRequest};

fn parse_provider(raw: &str) -> AppResult<OAuthProvider> {
    raw.parse()
        .map_err(|_| AppError::NotFound(format!("Unknown provider: {raw}")))
}

/// `GET /api/auth/ext/{provider}/url`
pub async fn authorization_url_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
) -> AppResult<Json<AuthorizationUrlResponse>> {
    let provider = parse_provider(&provider)?;
    let url = state.oauth.authorization_url(provider).await?;
    Ok(Json(AuthorizationUrlResponse { url }))
}

/// `GET /api/auth/ext/{provider}/callback`: redirects to the frontend with
/// the exchange code and an access token.
pub async fn callback_handler(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Query(params): Query<CallbackParams>,
) -> AppResult<Response> {
    let provider = parse_provider(&provider)?;
    let result = state.oauth.callback(provider, params).await?;
    let location = state.oauth.callback_redirect(&result)?;
    Ok((StatusCode::FOUND, [(LOCATION, location)]).into_response())
}

/// `POST /api/auth/ext/token`: redeem the exchange code.
pub async fn token_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: SignedCookieJar,
    Json(body): Json<ExchangeTokenRequest>,
) -> AppResult<(SignedCookieJar, Json<AuthResponse>)> {
    let result = state
        .oauth
        .token(&body.code, &body.redirect_uri, user.user_id)
        .await?;
    Ok(session_response(&state, jar, result))
}
