//! Local authentication and account handlers.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use axum_extra::extract::{CookieJar, SignedCookieJar};
use solveit_core::models::auth::AuthenticatedUser;

use super::{optional_json, session_response};
use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::models::{
    AddPasswordRequest, AuthResponse, ChangePasswordRequest, ConfirmEmailRequest,
    DeleteAccountRequest, EmailRequest, MessageResponse, ProvidersResponse, RefreshAccessRequest,
    ResetPasswordRequest, SignInRequest, SignUpRequest, UserResponse,
};
use crate::services::cookies::{clear_refresh_cookie, refresh_token_from};

type SessionResponse = AppResult<(SignedCookieJar, Json<AuthResponse>)>;

fn refresh_token(
    state: &AppState,
    raw: &CookieJar,
    jar: &SignedCookieJar,
    body: &Bytes,
) -> AppResult<String> {
    let body: RefreshAccessRequest = optional_json(body)?;
    refresh_token_from(raw, jar, &state.config, body.refresh_token)?
        .ok_or_else(|| AppError::Unauthorized("Missing refresh token".into()))
}

/// `POST /api/auth/sign-up`: register; the account awaits confirmation.
pub async fn sign_up_handler(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    let msg = state
        .auth
        .sign_up(&body.name, &body.email, &body.password1, &body.password2)
        .await?;
    Ok((StatusCode::CREATED, Json(msg.into())))
}

/// `POST /api/auth/sign-in`: authenticate with email or username.
pub async fn sign_in_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(body): Json<SignInRequest>,
) -> SessionResponse {
    let result = state
        .auth
        .sign_in(&body.email_or_username, &body.password)
        .await?;
    Ok(session_response(&state, jar, result))
}

/// `POST /api/auth/refresh-access`: rotate the token pair. The refresh
/// token is read from the cookie, else from the body.
pub async fn refresh_access_handler(
    State(state): State<AppState>,
    raw: CookieJar,
    jar: SignedCookieJar,
    body: Bytes,
) -> SessionResponse {
    let token = refresh_token(&state, &raw, &jar, &body)?;
    let result = state.auth.refresh_access(&token).await?;
    Ok(session_response(&state, jar, result))
}

/// `POST /api/auth/logout`: revoke every token of the user.
pub async fn logout_handler(
    State(state): State<AppState>,
    raw: CookieJar,
    jar: SignedCookieJar,
    body: Bytes,
) -> AppResult<(SignedCookieJar, Json<MessageResponse>)> {
    let token = refresh_token(&state, &raw, &jar, &body)?;
    let msg = state.auth.logout(&token).await?;
    let jar = jar.remove(clear_refresh_cookie(&state.config));
    Ok((jar, Json(msg.into())))
}

/// `POST /api/auth/confirm-email`
pub async fn confirm_email_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(body): Json<ConfirmEmailRequest>,
) -> SessionResponse {
    let result = state.auth.confirm_email(&body.confirmation_token).await?;
    Ok(session_response(&state, jar, result))
}

/// `POST /api/auth/forgot-password`: always acknowledges.
pub async fn forgot_password_handler(
    State(state): State<AppState>,
    Json(body): Json<EmailRequest>,
) -> AppResult<Json<MessageResponse>> {
    let msg = state.auth.reset_password_email(&body.email).await?;
    Ok(Json(msg.into()))
}

/// `POST /api/auth/reset-password`
pub async fn reset_password_handler(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(body): Json<ResetPasswordRequest>,
) -> SessionResponse {
    let result = state
        .auth
        .reset_password(&body.reset_token, &body.password1, &body.password2)
        .await?;
    Ok(session_response(&state, jar, result))
}

/// `PATCH /api/auth/update-password`
pub async fn update_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: SignedCookieJar,
    Json(body): Json<ChangePasswordRequest>,
) -> SessionResponse {
    let result = state
        .auth
        .update_password(user.user_id, &body.password, &body.password1, &body.password2)
        .await?;
    Ok(session_response(&state, jar, result))
}

/// `POST /api/auth/add-password`: give a federated account a local password.
pub async fn add_password_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: SignedCookieJar,
    Json(body): Json<AddPasswordRequest>,
) -> SessionResponse {
    let result = state
        .auth
        .add_local_credential(user.user_id, &body.password1, &body.password2)
        .await?;
    Ok(session_response(&state, jar, result))
}

/// `GET /api/auth/me`
pub async fn me_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<UserResponse>> {
    let user = state.auth.me(user.user_id).await?;
    Ok(Json(user.into()))
}

/// `GET /api/auth/providers`
pub async fn providers_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
) -> AppResult<Json<ProvidersResponse>> {
    let links = state.auth.providers(user.user_id).await?;
    Ok(Json(links.into()))
}

/// `DELETE /api/auth/account`
pub async fn delete_account_handler(
    State(state): State<AppState>,
    Extension(user): Extension<AuthenticatedUser>,
    jar: SignedCookieJar,
    body: Bytes,
) -> AppResult<(SignedCookieJar, Json<MessageResponse>)> {
    let body: DeleteAccountRequest = optional_json(&body)?;
    let msg = state
        .auth
        .delete_account(user.user_id, body.password.as_deref())
        .await?;
    let jar = jar.remove(clear_refresh_cookie(&state.config));
    Ok((jar, Json(msg.into())))
}
