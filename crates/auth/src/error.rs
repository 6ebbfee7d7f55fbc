//! Authentication errors

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use smartspend_common::RepositoryError;

/// Authentication error
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("authorization required")]
    MissingAuthorization,

    #[error("missing bearer prefix")]
    InvalidAuthorizationFormat,

    #[error("malformed token: {0}")]
    Malformed(String),

    #[error("invalid token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("invalid audience")]
    AudienceMismatch,

    #[error("no matching key found for kid {0}")]
    KeyNotFound(String),

    #[error("signing key rejected: {0}")]
    KeyRejected(String),

    #[error("RSA key too small: {0} bits")]
    WeakKey(usize),

    #[error("{0}")]
    ClaimInvalid(String),

    #[error("invalid token")]
    InvalidToken,

    #[error("email claim missing")]
    MissingEmail,

    #[error("user not found")]
    NotFound,

    #[error("refresh token does not match")]
    Mismatch,

    #[error("refresh token expired")]
    RefreshTokenExpired,

    #[error("identity provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("storage error: {0}")]
    Storage(#[from] RepositoryError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::Storage(_) | AuthError::Internal(_) | AuthError::Configuration(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }

    /// Stable machine-readable code; clients branch on this, never on `reason`
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingAuthorization => "AUTHORIZATION_REQUIRED",
            AuthError::InvalidAuthorizationFormat => "INVALID_AUTHORIZATION_FORMAT",
            AuthError::Expired => "TOKEN_EXPIRED",
            AuthError::MissingEmail => "MISSING_EMAIL",
            AuthError::NotFound => "USER_NOT_FOUND",
            AuthError::Mismatch => "REFRESH_TOKEN_MISMATCH",
            AuthError::RefreshTokenExpired => "REFRESH_TOKEN_EXPIRED",
            AuthError::UpstreamUnavailable(_) => "PROVIDER_UNAVAILABLE",
            AuthError::Storage(_) | AuthError::Internal(_) | AuthError::Configuration(_) => {
                "INTERNAL_ERROR"
            }
            AuthError::Malformed(_)
            | AuthError::BadSignature
            | AuthError::AudienceMismatch
            | AuthError::KeyNotFound(_)
            | AuthError::KeyRejected(_)
            | AuthError::WeakKey(_)
            | AuthError::ClaimInvalid(_)
            | AuthError::InvalidToken => "INVALID_TOKEN",
        }
    }

    /// Message safe to return to the caller
    pub fn reason(&self) -> String {
        match self {
            AuthError::UpstreamUnavailable(_) => "identity provider unavailable".to_string(),
            AuthError::Storage(_) | AuthError::Internal(_) | AuthError::Configuration(_) => {
                "internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "Authentication backend failure");
        } else if status == StatusCode::SERVICE_UNAVAILABLE {
            tracing::warn!(error = %self, "Identity provider unavailable");
        }

        let body = json!({ "error": self.reason(), "code": self.code() });
        (status, Json(body)).into_response()
    }
}

/// Failure of the access-token rotation endpoint
#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("authorization required")]
    AuthorizationRequired,

    #[error("cannot decode expired token")]
    CannotDecodeExpired,

    #[error("user not found")]
    UserNotFound,

    #[error("refresh token does not match")]
    RefreshTokenMismatch,

    #[error("refresh token expired")]
    RefreshTokenExpired,

    #[error("invalid access token")]
    InvalidAccessToken,

    #[error(transparent)]
    Backend(AuthError),
}

impl From<AuthError> for RotationError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::NotFound => RotationError::UserNotFound,
            AuthError::Mismatch => RotationError::RefreshTokenMismatch,
            AuthError::RefreshTokenExpired => RotationError::RefreshTokenExpired,
            AuthError::Storage(_) | AuthError::Internal(_) | AuthError::Configuration(_) => {
                RotationError::Backend(err)
            }
            _ => RotationError::InvalidAccessToken,
        }
    }
}

impl IntoResponse for RotationError {
    fn into_response(self) -> Response {
        match self {
            RotationError::Backend(err) => err.into_response(),
            other => {
                tracing::info!(reason = %other, "Access token rotation rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({ "error": other.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
