//! # solveit_api
//!
//! HTTP API library for Solveit authentication.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::routing::{delete, get, patch, post};
use axum_extra::extract::cookie::Key;
use solveit_core::auth::jwt::TokenCodec;
use solveit_core::auth::service::AuthService;
use solveit_core::cache::CorrelationCache;
use solveit_core::mail::Mailer;
use solveit_core::oauth2::OAuthBridge;
use solveit_core::oauth2::transport::OAuthTransport;
use solveit_core::store::CredentialStore;
use sqlx::PgPool;
use tower_http::cors::{Any, CorsLayer};

use crate::config::ApiConfig;
use crate::handlers::{auth, oauth};
use crate::services::cookies::signing_key;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
    pub oauth: Arc<OAuthBridge>,
    pub config: ApiConfig,
    /// Signs the refresh-token cookie.
    pub cookie_key: Key,
}

impl AppState {
    /// Wire the services over the given collaborators. Both services share
    /// one token codec.
    pub fn new(
        config: ApiConfig,
        store: Arc<dyn CredentialStore>,
        cache: Arc<dyn CorrelationCache>,
        mailer: Arc<dyn Mailer>,
        transport: Arc<dyn OAuthTransport>,
    ) -> Self {
        let codec = Arc::new(TokenCodec::new(&config.jwt));
        let auth = AuthService::new(store.clone(), mailer, codec.clone(), config.auth.clone());
        let oauth = OAuthBridge::new(config.oauth.clone(), cache, store, codec, transport);
        Self {
            auth: Arc::new(auth),
            oauth: Arc::new(oauth),
            cookie_key: signing_key(&config.cookie_secret),
            config,
        }
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}

/// Run embedded database migrations.
///
/// Delegates to `solveit_core::migrate::migrate()` which owns the migration files.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    solveit_core::migrate::migrate(pool).await
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (no auth required)
    let public = Router::new()
        .route(routes::POST_AUTH_SIGN_UP, post(auth::sign_up_handler))
        .route(routes::POST_AUTH_SIGN_IN, post(auth::sign_in_handler))
        .route(
            routes::POST_AUTH_REFRESH_ACCESS,
            post(auth::refresh_access_handler),
        )
        .route(
            routes::POST_AUTH_CONFIRM_EMAIL,
            post(auth::confirm_email_handler),
        )
        .route(
            routes::POST_AUTH_FORGOT_PASSWORD,
            post(auth::forgot_password_handler),
        )
        .route(
            routes::POST_AUTH_RESET_PASSWORD,
            post(auth::reset_password_handler),
        )
        .route(
            routes::GET_AUTH_EXT_URL,
            get(oauth::authorization_url_handler),
        )
        .route(routes::GET_AUTH_EXT_CALLBACK, get(oauth::callback_handler));

    // Protected routes (require auth)
    let protected = Router::new()
        .route(routes::POST_AUTH_LOGOUT, post(auth::logout_handler))
        .route(
            routes::PATCH_AUTH_UPDATE_PASSWORD,
            patch(auth::update_password_handler),
        )
        .route(routes::POST_AUTH_ADD_PASSWORD, post(auth::add_password_handler))
        .route(routes::GET_AUTH_ME, get(auth::me_handler))
        .route(routes::GET_AUTH_PROVIDERS, get(auth::providers_handler))
        .route(
            routes::DELETE_AUTH_ACCOUNT,
            delete(auth::delete_account_handler),
        )
        .route(routes::POST_AUTH_EXT_TOKEN, post(oauth::token_handler))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_auth,
        ));

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(cors)
        .with_state(state)
}
