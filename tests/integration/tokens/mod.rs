//! Access token rotation integration tests

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::common::{rotation_request, TestApp, TestOptions, JWT_SECRET};

/// Subject of an access token, checked against the shared secret
fn subject(access_token: &str) -> Uuid {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_aud = false;
    let data = decode::<Value>(
        access_token,
        &DecodingKey::from_secret(JWT_SECRET.as_bytes()),
        &validation,
    )
    .unwrap();
    data.claims["sub"].as_str().unwrap().parse().unwrap()
}

mod test_rotation {
    use super::*;

    #[tokio::test]
    async fn test_valid_token_is_returned_unchanged_every_time() {
        let app = TestApp::new();
        let user = app.create_user("abc", Utc::now() + Duration::days(10));
        let token = app.access_token(user.id, Utc::now());

        let (status, first) = app.send(rotation_request(Some(&token), Some("abc"))).await;
        let (_, second) = app.send(rotation_request(Some(&token), Some("abc"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(first["accessToken"], token);
        assert_eq!(second["accessToken"], token);
    }

    #[tokio::test]
    async fn test_expired_token_with_matching_refresh_token() {
        let app = TestApp::new();
        let user = app.create_user("abc", Utc::now() + Duration::days(10));
        let expired = app.access_token(user.id, Utc::now() - Duration::hours(2));

        let (status, body) = app.send(rotation_request(Some(&expired), Some("abc"))).await;

        assert_eq!(status, StatusCode::OK);
        let rotated = body["accessToken"].as_str().unwrap();
        assert_ne!(rotated, expired);
        assert_eq!(subject(rotated), user.id);

        // Refresh token rotates only on login by default
        assert_eq!(app.store.get(user.id).unwrap().refresh_token, "abc");
        assert!(body.get("refreshToken").is_none());
    }

    #[tokio::test]
    async fn test_wrong_refresh_token() {
        let app = TestApp::new();
        let user = app.create_user("abc", Utc::now() + Duration::days(10));
        let expired = app.access_token(user.id, Utc::now() - Duration::hours(2));

        let (status, body) = app.send(rotation_request(Some(&expired), Some("wrong"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "refresh token does not match" }));
    }

    #[tokio::test]
    async fn test_single_character_difference_fails() {
        let app = TestApp::new();
        let stored = "a".repeat(128);
        let user = app.create_user(&stored, Utc::now() + Duration::days(10));
        let expired = app.access_token(user.id, Utc::now() - Duration::hours(2));

        let mut presented = stored.clone();
        presented.replace_range(127.., "b");
        let (status, body) = app.send(rotation_request(Some(&expired), Some(&presented))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "refresh token does not match");

        let (status, _) = app.send(rotation_request(Some(&expired), Some(&stored[..127]))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_refresh_token() {
        let app = TestApp::new();
        let user = app.create_user("abc", Utc::now() - Duration::minutes(1));
        let expired = app.access_token(user.id, Utc::now() - Duration::hours(2));

        let (status, body) = app.send(rotation_request(Some(&expired), Some("abc"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({ "error": "refresh token expired" }));
    }

    #[tokio::test]
    async fn test_failure_reasons() {
        let app = TestApp::new();
        let orphan = app.access_token(Uuid::new_v4(), Utc::now() - Duration::hours(2));

        let (status, body) = app.send(rotation_request(None, Some("abc"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "authorization required");

        let (_, body) = app.send(rotation_request(Some(&orphan), Some("abc"))).await;
        assert_eq!(body["error"], "user not found");

        let (_, body) = app.send(rotation_request(Some("garbage"), Some("abc"))).await;
        assert_eq!(body["error"], "invalid access token");
    }

    #[tokio::test]
    async fn test_tampered_expired_token_is_not_rotated() {
        let app = TestApp::new();
        let user = app.create_user("abc", Utc::now() + Duration::days(10));
        let expired = app.access_token(user.id, Utc::now() - Duration::hours(2));

        let (head, signature) = expired.rsplit_once('.').unwrap();
        let flipped = if signature.starts_with('A') { "B" } else { "A" };
        let tampered = format!("{}.{}{}", head, flipped, &signature[1..]);

        let (status, body) = app.send(rotation_request(Some(&tampered), Some("abc"))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid access token");
    }

    #[tokio::test]
    async fn test_logged_out_user_cannot_rotate() {
        let app = TestApp::new();
        let user = app.create_user("", chrono::DateTime::<Utc>::UNIX_EPOCH);
        let expired = app.access_token(user.id, Utc::now() - Duration::hours(2));

        let (status, body) = app.send(rotation_request(Some(&expired), Some(""))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "refresh token does not match");
    }
}

mod test_rotation_on_use {
    use super::*;

    fn app() -> TestApp {
        TestApp::with_options(TestOptions {
            rotate_refresh_token_on_use: true,
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_refresh_token_replaced_and_old_one_retired() {
        let app = app();
        let user = app.create_user("abc", Utc::now() + Duration::days(10));
        let expired = app.access_token(user.id, Utc::now() - Duration::hours(2));

        let (status, body) = app.send(rotation_request(Some(&expired), Some("abc"))).await;

        assert_eq!(status, StatusCode::OK);
        let new_refresh = body["refreshToken"].as_str().unwrap().to_string();
        assert_ne!(new_refresh, "abc");
        assert!(body["refreshTokenExpiry"].is_string());
        assert_eq!(app.store.get(user.id).unwrap().refresh_token, new_refresh);

        let (status, body) = app.send(rotation_request(Some(&expired), Some("abc"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "refresh token does not match");

        let (status, _) = app.send(rotation_request(Some(&expired), Some(&new_refresh))).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_concurrent_rotations_have_one_winner() {
        let app = app();
        let user = app.create_user("abc", Utc::now() + Duration::days(10));
        let expired = app.access_token(user.id, Utc::now() - Duration::hours(2));

        let (first, second) = tokio::join!(
            app.send(rotation_request(Some(&expired), Some("abc"))),
            app.send(rotation_request(Some(&expired), Some("abc"))),
        );

        let successes = [first.0, second.0]
            .iter()
            .filter(|status| **status == StatusCode::OK)
            .count();
        assert_eq!(successes, 1);
    }
}
