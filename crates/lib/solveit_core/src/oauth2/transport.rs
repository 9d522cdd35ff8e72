//! HTTP calls to identity providers.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::auth::AuthError;

/// Provider HTTP errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The provider answered with a non-success status.
    #[error("Provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// Connection failure or timeout.
    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider response unreadable: {0}")]
    Decode(String),
}

impl From<TransportError> for AuthError {
    fn from(e: TransportError) -> Self {
        match e {
            TransportError::Request(msg) => AuthError::ServiceError(msg),
            TransportError::Status { .. } | TransportError::Decode(_) => {
                AuthError::Unauthorized("Provider rejected the authorization".into())
            }
        }
    }
}

/// Authorization-code grant parameters.
#[derive(Debug, Clone, Copy)]
pub struct TokenRequest<'a> {
    pub code: &'a str,
    pub client_id: &'a str,
    pub client_secret: &'a str,
    pub redirect_uri: &'a str,
}

#[async_trait]
pub trait OAuthTransport: Send + Sync {
    /// Redeem an authorization code; returns the provider access token.
    async fn exchange_code(
        &self,
        token_url: &str,
        request: TokenRequest<'_>,
    ) -> Result<String, TransportError>;

    /// Fetch the user-info document with a provider access token.
    async fn fetch_user_info(
        &self,
        user_info_url: &str,
        access_token: &str,
    ) -> Result<serde_json::Value, TransportError>;
}

#[derive(Deserialize)]
struct ProviderTokenResponse {
    access_token: String,
}

/// `reqwest` transport with a per-request timeout. No retries.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Request(format!("HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let body = resp.text().await.unwrap_or_default();
    debug!(status, "provider rejected request");
    Err(TransportError::Status { status, body })
}

#[async_trait]
impl OAuthTransport for HttpTransport {
    async fn exchange_code(
        &self,
        token_url: &str,
        request: TokenRequest<'_>,
    ) -> Result<String, TransportError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", request.code),
            ("client_id", request.client_id),
            ("client_secret", request.client_secret),
            ("redirect_uri", request.redirect_uri),
        ];

        let resp = self
            .client
            .post(token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("Token exchange failed: {e}")))?;

        check_status(resp)
            .await?
            .json::<ProviderTokenResponse>()
            .await
            .map(|t| t.access_token)
            .map_err(|e| TransportError::Decode(format!("Token response: {e}")))
    }

    async fn fetch_user_info(
        &self,
        user_info_url: &str,
        access_token: &str,
    ) -> Result<serde_json::Value, TransportError> {
        let resp = self
            .client
            .get(user_info_url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| TransportError::Request(format!("User info failed: {e}")))?;

        check_status(resp)
            .await?
            .json::<serde_json::Value>()
            .await
            .map_err(|e| TransportError::Decode(format!("User info response: {e}")))
    }
}
