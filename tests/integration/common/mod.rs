//! Common test utilities and fixtures for integration tests
//!
//! The application under test is the real router from `smartspend_app`, wired to
//! an in-memory user store and to key sets served from memory, so provider
//! tokens can be signed locally with the fixture RSA keys.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use smartspend_auth::providers::{AppleVerifier, CachedKeySet, GoogleVerifier};
use smartspend_auth::testing::{
    fixture_jwk, mint_access_token, user_with_refresh_token, InMemoryUserStore,
    StaticKeySetSource,
};
use smartspend_auth::{AuthConfig, AuthServices, User};
use tower::ServiceExt;
use uuid::Uuid;

pub const JWT_SECRET: &str = "test_secret_key_for_testing_only";
pub const GOOGLE_WEB_CLIENT: &str = "web-client.apps.googleusercontent.com";
pub const GOOGLE_IOS_CLIENT: &str = "ios-client.apps.googleusercontent.com";
pub const APPLE_CLIENT: &str = "com.smartspend.app";

/// Knobs for building a [`TestApp`]
#[derive(Debug, Clone)]
pub struct TestOptions {
    pub rotate_refresh_token_on_use: bool,
    pub key_cache_ttl: Duration,
}

impl Default for TestOptions {
    fn default() -> Self {
        Self {
            rotate_refresh_token_on_use: false,
            key_cache_ttl: Duration::from_secs(3600),
        }
    }
}

/// Test application with handles on its collaborators
pub struct TestApp {
    pub router: Router,
    pub store: Arc<InMemoryUserStore>,
    pub google_keys: Arc<StaticKeySetSource>,
    pub apple_keys: Arc<StaticKeySetSource>,
    pub auth_config: AuthConfig,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(TestOptions::default())
    }

    pub fn with_options(options: TestOptions) -> Self {
        let mut auth_config = AuthConfig::new(JWT_SECRET);
        auth_config.rotate_refresh_token_on_use = options.rotate_refresh_token_on_use;

        let store = Arc::new(InMemoryUserStore::new());
        let google_keys = Arc::new(StaticKeySetSource::new(vec![fixture_jwk()]));
        let apple_keys = Arc::new(StaticKeySetSource::new(vec![fixture_jwk()]));

        let google = GoogleVerifier::new(
            vec![GOOGLE_WEB_CLIENT.to_string(), GOOGLE_IOS_CLIENT.to_string()],
            Arc::new(CachedKeySet::new(google_keys.clone(), options.key_cache_ttl)),
        )
        .unwrap();
        let apple = AppleVerifier::new(
            APPLE_CLIENT,
            Arc::new(CachedKeySet::new(apple_keys.clone(), options.key_cache_ttl)),
        )
        .unwrap();

        let auth = AuthServices::new(
            &auth_config,
            store.clone(),
            Arc::new(google),
            Arc::new(apple),
        )
        .unwrap();

        TestApp {
            router: smartspend_app::build_router(auth),
            store,
            google_keys,
            apple_keys,
            auth_config,
        }
    }

    /// Send a request through the router and decode the JSON body, if any
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::String(
                String::from_utf8_lossy(&body).into_owned(),
            ))
        };
        (status, json)
    }

    /// Seed a user holding `refresh_token` until `expires_at`
    pub fn create_user(&self, refresh_token: &str, expires_at: DateTime<Utc>) -> User {
        let user = user_with_refresh_token(refresh_token, expires_at);
        self.store.insert(user.clone());
        user
    }

    pub fn access_token(&self, user_id: Uuid, issued_at: DateTime<Utc>) -> String {
        mint_access_token(&self.auth_config, user_id, issued_at)
    }
}

pub fn json_post(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}

pub fn authorized(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(AUTHORIZATION, bearer(token))
        .body(Body::empty())
        .unwrap()
}

/// `POST /api/token` with optional Authorization and Refresh-Token headers
pub fn rotation_request(access_token: Option<&str>, refresh_token: Option<&str>) -> Request<Body> {
    let mut builder = Request::post("/api/token");
    if let Some(token) = access_token {
        builder = builder.header(AUTHORIZATION, bearer(token));
    }
    if let Some(token) = refresh_token {
        builder = builder.header("Refresh-Token", token);
    }
    builder.body(Body::empty()).unwrap()
}
