//! Integration tests: in-memory collaborators, build router, drive the auth
//! routes end to end.

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response, StatusCode};
use serde_json::{Value, json};
use solveit_api::{AppState, config::ApiConfig};
use solveit_core::cache::memory::MemoryCache;
use solveit_core::config::{AuthConfig, JwtConfig, OAuthClientConfig, OAuthConfig};
use solveit_core::mail::{MailKind, MemoryMailer};
use solveit_core::oauth2::transport::{OAuthTransport, TokenRequest, TransportError};
use solveit_core::store::memory::MemoryCredentialStore;
use tower::ServiceExt;

const EMAIL: &str = "jane@example.com";
const PASSWORD: &str = "Secret123";

struct FakeTransport;

#[async_trait]
impl OAuthTransport for FakeTransport {
    async fn exchange_code(
        &self,
        _token_url: &str,
        _request: TokenRequest<'_>,
    ) -> Result<String, TransportError> {
        Ok("provider-access-token".into())
    }

    async fn fetch_user_info(
        &self,
        _user_info_url: &str,
        _access_token: &str,
    ) -> Result<Value, TransportError> {
        Ok(json!({ "email": "sam@example.com", "name": "Sam Hill" }))
    }
}

struct TestApp {
    app: Router,
    mailer: Arc<MemoryMailer>,
}

fn test_app() -> TestApp {
    let mut oauth = OAuthConfig::new("https://api.example.com", "https://app.example.com");
    oauth.google = Some(OAuthClientConfig {
        client_id: "google-id".into(),
        client_secret: "google-secret".into(),
    });
    let config = ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        database_url: String::new(),
        cookie_name: "solveit_refresh".into(),
        cookie_secret: "cookie-secret".into(),
        testing: true,
        jwt: JwtConfig::with_secret("test-secret"),
        oauth,
        auth: AuthConfig { bcrypt_cost: 4 },
    };
    let mailer = Arc::new(MemoryMailer::new());
    let state = AppState::new(
        config,
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(MemoryCache::new()),
        mailer.clone(),
        Arc::new(FakeTransport),
    );
    TestApp {
        app: solveit_api::router(state),
        mailer,
    }
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> Response<Body> {
        self.app.clone().oneshot(req).await.expect("request")
    }

    async fn sign_up(&self) -> Response<Body> {
        self.send(post_json(
            "/api/auth/sign-up",
            json!({
                "name": "Jane Doe",
                "email": EMAIL,
                "password1": PASSWORD,
                "password2": PASSWORD,
            }),
        ))
        .await
    }

    /// Sign up and confirm; returns the confirmation response.
    async fn confirmed(&self) -> Response<Body> {
        assert_eq!(self.sign_up().await.status(), StatusCode::CREATED);
        let token = self
            .mailer
            .last_token(MailKind::Confirmation, EMAIL)
            .expect("confirmation mail");
        let resp = self
            .send(post_json(
                "/api/auth/confirm-email",
                json!({ "confirmationToken": token }),
            ))
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        resp
    }
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

/// `name=value` pair of the `Set-Cookie` header, ready to send back.
fn cookie_pair(resp: &Response<Body>) -> String {
    let header = resp
        .headers()
        .get(SET_COOKIE)
        .expect("set-cookie")
        .to_str()
        .unwrap();
    header.split(';').next().unwrap().to_string()
}

async fn body_json(resp: Response<Body>) -> Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}

fn query_param(url: &str, name: &str) -> String {
    let query = url.split_once('?').expect("query string").1;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix(&format!("{name}=")))
        .expect("query param")
        .to_string()
}

#[tokio::test]
async fn sign_up_returns_created_and_mails_confirmation() {
    let t = test_app();
    let resp = t.sign_up().await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let json = body_json(resp).await;
    assert_eq!(json["message"], "Registration successful");
    assert!(json["id"].is_string());
    assert!(t.mailer.last_token(MailKind::Confirmation, EMAIL).is_some());
}

#[tokio::test]
async fn duplicate_sign_up_conflicts() {
    let t = test_app();
    t.sign_up().await;
    let resp = t.sign_up().await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(resp).await["error"], "conflict");
}

#[tokio::test]
async fn unconfirmed_sign_in_is_rejected() {
    let t = test_app();
    t.sign_up().await;
    let resp = t
        .send(post_json(
            "/api/auth/sign-in",
            json!({ "emailOrUsername": EMAIL, "password": PASSWORD }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(resp).await;
    assert_eq!(
        json["message"],
        "Please confirm your email, a new email has been sent"
    );
}

#[tokio::test]
async fn sign_in_sets_signed_refresh_cookie() {
    let t = test_app();
    t.confirmed().await;
    let resp = t
        .send(post_json(
            "/api/auth/sign-in",
            json!({ "emailOrUsername": EMAIL, "password": PASSWORD }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let set_cookie = resp.headers().get(SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with("solveit_refresh="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("Path=/api/auth"));

    let json = body_json(resp).await;
    assert_eq!(json["tokenType"], "Bearer");
    assert_eq!(json["expiresIn"], 900);
    assert_eq!(json["user"]["email"], EMAIL);
}

#[tokio::test]
async fn wrong_password_gets_uniform_error() {
    let t = test_app();
    t.confirmed().await;
    let resp = t
        .send(post_json(
            "/api/auth/sign-in",
            json!({ "emailOrUsername": EMAIL, "password": "Wrong1234" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Invalid credentials");
}

#[tokio::test]
async fn me_requires_bearer_token() {
    let t = test_app();
    let resp = t.confirmed().await;
    let access = body_json(resp).await["accessToken"]
        .as_str()
        .unwrap()
        .to_string();

    let anonymous = Request::builder()
        .uri("/api/auth/me")
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(anonymous).await.status(), StatusCode::UNAUTHORIZED);

    let resp = t.send(get_with_bearer("/api/auth/me", &access)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["username"], "jane.doe");
}

#[tokio::test]
async fn refresh_accepts_body_token_without_cookie() {
    let t = test_app();
    let resp = t.confirmed().await;
    let refresh = body_json(resp).await["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let resp = t
        .send(post_json(
            "/api/auth/refresh-access",
            json!({ "refreshToken": refresh }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_json(resp).await["accessToken"].is_string());
}

#[tokio::test]
async fn refresh_without_any_token_is_unauthorized() {
    let t = test_app();
    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/refresh-access")
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_revokes_refresh_cookie() {
    let t = test_app();
    let resp = t.confirmed().await;
    let cookie = cookie_pair(&resp);
    let access = body_json(resp).await["accessToken"]
        .as_str()
        .unwrap()
        .to_string();

    let logout = Request::builder()
        .method("POST")
        .uri("/api/auth/logout")
        .header(AUTHORIZATION, format!("Bearer {access}"))
        .header(COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    let resp = t.send(logout).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["message"], "Logout successful");

    let refresh = Request::builder()
        .method("POST")
        .uri("/api/auth/refresh-access")
        .header(COOKIE, &cookie)
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(refresh).await.status(), StatusCode::UNAUTHORIZED);

    // The access token died with the same version bump.
    let resp = t.send(get_with_bearer("/api/auth/me", &access)).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forgot_password_acknowledges_unknown_email() {
    let t = test_app();
    let resp = t
        .send(post_json(
            "/api/auth/forgot-password",
            json!({ "email": "nobody@example.com" }),
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(t.mailer.sent().is_empty());
}

#[tokio::test]
async fn disabled_provider_is_not_found() {
    let t = test_app();
    let req = Request::builder()
        .uri("/api/auth/ext/facebook/url")
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(req).await.status(), StatusCode::NOT_FOUND);

    let req = Request::builder()
        .uri("/api/auth/ext/myspace/url")
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(req).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn oauth_flow_redirects_and_redeems_exchange_code() {
    let t = test_app();
    let req = Request::builder()
        .uri("/api/auth/ext/google/url")
        .body(Body::empty())
        .unwrap();
    let resp = t.send(req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let url = body_json(resp).await["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("https://accounts.google.com/o/oauth2/v2/auth?"));
    let state = query_param(&url, "state");

    let req = Request::builder()
        .uri(format!(
            "/api/auth/ext/google/callback?code=provider-code&state={state}"
        ))
        .body(Body::empty())
        .unwrap();
    let resp = t.send(req).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let location = resp
        .headers()
        .get(LOCATION)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(location.starts_with("https://app.example.com/auth/callback?"));
    let code = query_param(&location, "code");
    let access = query_param(&location, "accessToken");

    let redeem = |code: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/auth/ext/token")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::from(
                json!({
                    "code": code,
                    "redirectUri": "https://app.example.com/auth/callback",
                })
                .to_string(),
            ))
            .unwrap()
    };
    let resp = t.send(redeem(&code)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().get(SET_COOKIE).is_some());
    assert_eq!(body_json(resp).await["user"]["email"], "sam@example.com");

    // Exchange codes are single-use.
    assert_eq!(
        t.send(redeem(&code)).await.status(),
        StatusCode::UNAUTHORIZED
    );

    let resp = t.send(get_with_bearer("/api/auth/providers", &access)).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["data"][0]["provider"], "google");
}

#[tokio::test]
async fn callback_with_unknown_state_is_rejected() {
    let t = test_app();
    let req = Request::builder()
        .uri("/api/auth/ext/google/callback?code=provider-code&state=forged")
        .body(Body::empty())
        .unwrap();
    assert_eq!(t.send(req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn delete_account_requires_password() {
    let t = test_app();
    let resp = t.confirmed().await;
    let access = body_json(resp).await["accessToken"]
        .as_str()
        .unwrap()
        .to_string();

    let delete = |body: Value| {
        Request::builder()
            .method("DELETE")
            .uri("/api/auth/account")
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {access}"))
            .body(Body::from(body.to_string()))
            .unwrap()
    };
    assert_eq!(
        t.send(delete(json!({ "password": "Wrong1234" })))
            .await
            .status(),
        StatusCode::UNAUTHORIZED
    );
    assert_eq!(
        t.send(delete(json!({ "password": PASSWORD }))).await.status(),
        StatusCode::OK
    );
}

#[tokio::test]
async fn forged_refresh_cookie_is_rejected_despite_body_token() {
    let t = test_app();
    let resp = t.confirmed().await;
    let refresh = body_json(resp).await["refreshToken"]
        .as_str()
        .unwrap()
        .to_string();

    let req = Request::builder()
        .method("POST")
        .uri("/api/auth/refresh-access")
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, "solveit_refresh=forged")
        .body(Body::from(json!({ "refreshToken": refresh }).to_string()))
        .unwrap();
    let resp = t.send(req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Invalid refresh cookie");
}
