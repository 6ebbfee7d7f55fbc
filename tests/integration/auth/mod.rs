//! Provider sign-in integration tests
//!
//! Google and Apple identity tokens are signed with the fixture key the
//! in-memory key sets publish.

use axum::http::StatusCode;
use serde_json::json;
use smartspend_auth::testing::{apple_claims, google_claims, sign_provider_token, FIXTURE_KID};

use crate::common::{authorized, json_post, TestApp, APPLE_CLIENT, GOOGLE_IOS_CLIENT, GOOGLE_WEB_CLIENT};

mod test_google_sign_in {
    use super::*;

    #[tokio::test]
    async fn test_new_identity_creates_user() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &google_claims(GOOGLE_WEB_CLIENT, "new@x.com"));

        let (status, body) = app
            .send(json_post("/api/auth/google", json!({ "idToken": id_token })))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["isNewUser"], true);
        assert_eq!(body["message"], "Successfully signed up with Google!");
        assert_eq!(body["userProfile"]["googleEmail"], "new@x.com");
        assert_eq!(body["userProfile"]["username"], "new");
        assert_eq!(body["userProfile"]["preferredCurrency"], "MKD");
        assert!(body["userProfile"].get("refreshToken").is_none());

        let refresh_token = body["refreshToken"].as_str().unwrap();
        assert_eq!(refresh_token.len(), 128);
        assert!(refresh_token.chars().all(|c| c.is_ascii_hexdigit()));

        let user_id = body["userProfile"]["id"].as_str().unwrap().parse().unwrap();
        let stored = app.store.get(user_id).unwrap();
        assert_eq!(stored.google_email.as_deref(), Some("new@x.com"));
        assert_eq!(stored.refresh_token, refresh_token);

        // The issued access token opens protected endpoints
        let access_token = body["accessToken"].as_str().unwrap();
        let (status, profile) = app.send(authorized("GET", "/api/user/me", access_token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(profile["data"]["id"], body["userProfile"]["id"]);
    }

    #[tokio::test]
    async fn test_returning_identity_logs_in_and_replaces_refresh_token() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &google_claims(GOOGLE_WEB_CLIENT, "ana@x.com"));

        let (_, first) = app
            .send(json_post("/api/auth/google", json!({ "idToken": id_token })))
            .await;
        let (status, second) = app
            .send(json_post("/api/auth/google", json!({ "idToken": id_token })))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["isNewUser"], false);
        assert_eq!(second["message"], "Successfully logged in! Welcome back.");
        assert_eq!(second["userProfile"]["id"], first["userProfile"]["id"]);
        assert_ne!(second["refreshToken"], first["refreshToken"]);
        assert_eq!(app.store.len(), 1);
    }

    #[tokio::test]
    async fn test_second_configured_audience_accepted() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &google_claims(GOOGLE_IOS_CLIENT, "ios@x.com"));

        let (status, body) = app
            .send(json_post("/api/auth/google", json!({ "idToken": id_token })))
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["userProfile"]["googleEmail"], "ios@x.com");
    }

    #[tokio::test]
    async fn test_unconfigured_audience_rejected() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &google_claims("other-app", "ana@x.com"));

        let (status, body) = app
            .send(json_post("/api/auth/google", json!({ "idToken": id_token })))
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "invalid token", "code": "INVALID_TOKEN" }));
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_snake_case_body_accepted() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &google_claims(GOOGLE_WEB_CLIENT, "snake@x.com"));

        let (status, _) = app
            .send(json_post("/api/auth/google", json!({ "id_token": id_token })))
            .await;

        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_or_empty_id_token_is_bad_request() {
        let app = TestApp::new();

        let (status, _) = app.send(json_post("/api/auth/google", json!({}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .send(json_post("/api/auth/google", json!({ "idToken": "" })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
}

mod test_apple_sign_in {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_then_log_in() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &apple_claims(APPLE_CLIENT, Some("ana@icloud.com")));

        let (status, first) = app
            .send(json_post("/api/auth/apple", json!({ "idToken": id_token })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["isNewUser"], true);
        assert_eq!(first["message"], "Successfully signed up with Apple!");
        assert_eq!(first["userProfile"]["appleEmail"], "ana@icloud.com");
        assert!(first["userProfile"]["googleEmail"].is_null());

        let (status, second) = app
            .send(json_post("/api/auth/apple", json!({ "idToken": id_token })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["isNewUser"], false);
        assert_eq!(second["message"], "Successfully logged in with Apple!");
        assert_eq!(app.store.len(), 1);
    }

    #[tokio::test]
    async fn test_same_email_on_both_providers_is_two_users() {
        let app = TestApp::new();
        let google = sign_provider_token(FIXTURE_KID, &google_claims(GOOGLE_WEB_CLIENT, "ana@x.com"));
        let apple = sign_provider_token(FIXTURE_KID, &apple_claims(APPLE_CLIENT, Some("ana@x.com")));

        app.send(json_post("/api/auth/google", json!({ "idToken": google })))
            .await;
        let (_, body) = app
            .send(json_post("/api/auth/apple", json!({ "idToken": apple })))
            .await;

        assert_eq!(body["isNewUser"], true);
        assert_eq!(app.store.len(), 2);
    }

    #[tokio::test]
    async fn test_google_token_rejected_by_apple_endpoint() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &google_claims(GOOGLE_WEB_CLIENT, "ana@x.com"));

        let (status, body) = app
            .send(json_post("/api/auth/apple", json!({ "idToken": id_token })))
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());
        assert!(app.store.is_empty());
    }

    #[tokio::test]
    async fn test_withheld_email_matches_by_subject() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &apple_claims(APPLE_CLIENT, None));

        let (status, first) = app
            .send(json_post("/api/auth/apple", json!({ "idToken": id_token })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["isNewUser"], true);
        assert!(first["userProfile"]["appleEmail"].is_null());

        let (status, second) = app
            .send(json_post("/api/auth/apple", json!({ "idToken": id_token })))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(second["isNewUser"], false);
        assert_eq!(second["userProfile"]["id"], first["userProfile"]["id"]);
        assert_eq!(app.store.len(), 1);
    }

    #[tokio::test]
    async fn test_apple_email_persisted() {
        let app = TestApp::new();
        let id_token = sign_provider_token(FIXTURE_KID, &apple_claims(APPLE_CLIENT, Some("p@icloud.com")));

        let (_, body) = app
            .send(json_post("/api/auth/apple", json!({ "idToken": id_token })))
            .await;

        let user_id = body["userProfile"]["id"].as_str().unwrap().parse().unwrap();
        let stored = app.store.get(user_id).unwrap();
        assert_eq!(stored.apple_email.as_deref(), Some("p@icloud.com"));
        assert_eq!(stored.google_email, None);
    }
}
