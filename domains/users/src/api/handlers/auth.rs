//! Sign-in and logout API handlers
//!
//! Implements:
//! - POST /api/auth/google - Sign in or sign up with a Google ID token
//! - POST /api/auth/apple - Sign in or sign up with an Apple identity token
//! - POST /api/auth/logout - Clear the caller's refresh token

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smartspend_auth::{AuthError, IdentityVerifier, ProviderKind, SignInOutcome};
use smartspend_common::ValidatedJson;
use validator::Validate;

use crate::api::handlers::users::UserProfileResponse;
use crate::api::middleware::{AuthUser, UsersState};

/// Body of both sign-in endpoints
#[derive(Debug, Deserialize, Validate)]
pub struct IdTokenRequest {
    #[serde(rename = "idToken", alias = "id_token")]
    #[validate(length(min = 1))]
    pub id_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub message: String,
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_expiry: DateTime<Utc>,
    pub user_profile: UserProfileResponse,
    pub is_new_user: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn welcome_message(provider: ProviderKind, is_new_user: bool) -> String {
    match (provider, is_new_user) {
        (ProviderKind::Google, true) => "Successfully signed up with Google!",
        (ProviderKind::Google, false) => "Successfully logged in! Welcome back.",
        (ProviderKind::Apple, true) => "Successfully signed up with Apple!",
        (ProviderKind::Apple, false) => "Successfully logged in with Apple!",
    }
    .to_string()
}

async fn sign_in_with(
    state: &UsersState,
    verifier: &dyn IdentityVerifier,
    id_token: &str,
) -> Result<Json<SignInResponse>, AuthError> {
    let identity = verifier.verify(id_token).await?;
    let SignInOutcome {
        user,
        access_token,
        refresh_token,
        refresh_token_expires_at,
        is_new_user,
    } = state.auth.sign_in.sign_in_or_sign_up(&identity).await?;

    Ok(Json(SignInResponse {
        message: welcome_message(identity.provider, is_new_user),
        access_token,
        refresh_token,
        refresh_token_expiry: refresh_token_expires_at,
        user_profile: UserProfileResponse::from(user),
        is_new_user,
    }))
}

/// POST /api/auth/google - Sign in or sign up with a Google ID token
pub async fn google_sign_in(
    State(state): State<UsersState>,
    ValidatedJson(request): ValidatedJson<IdTokenRequest>,
) -> Result<Json<SignInResponse>, AuthError> {
    sign_in_with(&state, state.auth.google.as_ref(), &request.id_token).await
}

/// POST /api/auth/apple - Sign in or sign up with an Apple identity token
pub async fn apple_sign_in(
    State(state): State<UsersState>,
    ValidatedJson(request): ValidatedJson<IdTokenRequest>,
) -> Result<Json<SignInResponse>, AuthError> {
    sign_in_with(&state, state.auth.apple.as_ref(), &request.id_token).await
}

/// POST /api/auth/logout - Clear the caller's refresh token
pub async fn logout(
    AuthUser(auth_context): AuthUser,
    State(state): State<UsersState>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.auth.sign_in.logout(auth_context.user_id).await?;

    Ok(Json(MessageResponse {
        message: "Successfully logged out".to_string(),
    }))
}
