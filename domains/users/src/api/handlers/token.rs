//! Access token rotation API handler
//!
//! Implements:
//! - POST /api/token - Exchange an expired access token and the refresh token for a new access token

use axum::{
    extract::State,
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use smartspend_auth::RotationError;

use crate::api::middleware::UsersState;

pub const REFRESH_TOKEN_HEADER: &str = "Refresh-Token";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateTokenResponse {
    pub message: String,
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token_expiry: Option<DateTime<Utc>>,
}

/// POST /api/token - Rotate an expired access token
pub async fn rotate_access_token(
    State(state): State<UsersState>,
    headers: HeaderMap,
) -> Result<Json<RotateTokenResponse>, RotationError> {
    let authorization = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .ok_or(RotationError::AuthorizationRequired)?;
    let access_token = authorization
        .strip_prefix("Bearer ")
        .unwrap_or(authorization);

    let refresh_token = headers
        .get(REFRESH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    let rotation = state
        .auth
        .tokens
        .rotate_access_token(access_token, refresh_token)
        .await?;

    let message = if rotation.rotated {
        "Access token rotated successfully"
    } else {
        "Access token is still valid, rotation not needed"
    };

    let (refresh_token, refresh_token_expiry) = match rotation.refresh {
        Some(grant) => (Some(grant.token), Some(grant.expires_at)),
        None => (None, None),
    };

    Ok(Json(RotateTokenResponse {
        message: message.to_string(),
        access_token: rotation.access_token,
        refresh_token,
        refresh_token_expiry,
    }))
}
