//! Token lifecycle: access token issuance and rotation, refresh token matching

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::Serialize;
use smartspend_common::constant_time_eq;
use uuid::Uuid;

use crate::claims::AccessTokenClaims;
use crate::config::AuthConfig;
use crate::error::{AuthError, RotationError};
use crate::jwt::AccessTokenSigner;
use crate::refresh::{RefreshGrant, RefreshTokenStore};
use crate::store::UserStore;

/// Outcome of a successful access token rotation request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessTokenRotation {
    pub access_token: String,
    /// `false` when the presented token was still valid and returned unchanged
    pub rotated: bool,
    /// Present only when refresh tokens rotate on use
    pub refresh: Option<RefreshGrant>,
}

/// Access and refresh token operations over a [`UserStore`].
///
/// Constructed once at startup and shared behind an `Arc`.
pub struct TokenService {
    signer: AccessTokenSigner,
    refresh: RefreshTokenStore,
    users: Arc<dyn UserStore>,
    refresh_token_ttl: Duration,
    rotate_refresh_token_on_use: bool,
}

impl std::fmt::Debug for TokenService {
    #[mutants::skip] // Debug output only
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("signer", &self.signer)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("rotate_refresh_token_on_use", &self.rotate_refresh_token_on_use)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    /// Fails when the signing secret is unusable, so misconfiguration surfaces at startup
    pub fn new(config: &AuthConfig, users: Arc<dyn UserStore>) -> Result<Self, AuthError> {
        Ok(Self {
            signer: AccessTokenSigner::new(config)?,
            refresh: RefreshTokenStore::new(users.clone()),
            users,
            refresh_token_ttl: config.refresh_token_ttl,
            rotate_refresh_token_on_use: config.rotate_refresh_token_on_use,
        })
    }

    pub fn issue_access_token(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.signer.issue(user_id)
    }

    pub fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.signer.verify(token)
    }

    /// New refresh token with the configured lifetime, not yet persisted
    pub fn new_refresh_grant(&self) -> Result<RefreshGrant, AuthError> {
        RefreshGrant::issue(self.refresh_token_ttl)
    }

    /// Issue a refresh token for `user_id` and store it in place of any previous one
    pub async fn grant_refresh_token(&self, user_id: Uuid) -> Result<RefreshGrant, AuthError> {
        let grant = self.new_refresh_grant()?;
        self.refresh.write(user_id, &grant).await?;
        Ok(grant)
    }

    /// Check `candidate` against the user's stored refresh token.
    ///
    /// An empty value on either side never matches.
    pub async fn validate_refresh_token(
        &self,
        candidate: &str,
        user_id: Uuid,
    ) -> Result<(), AuthError> {
        let stored = self
            .refresh
            .read(user_id)
            .await?
            .ok_or(AuthError::NotFound)?;

        if candidate.is_empty()
            || stored.token.is_empty()
            || !constant_time_eq(&stored.token, candidate)
        {
            tracing::warn!(user_id = %user_id, "Refresh token does not match");
            return Err(AuthError::Mismatch);
        }

        if stored.expires_at <= Utc::now() {
            tracing::info!(user_id = %user_id, "Refresh token expired");
            return Err(AuthError::RefreshTokenExpired);
        }

        Ok(())
    }

    /// Validate `candidate` and replace it with a fresh token in one conditional update.
    ///
    /// A concurrent rotation that already replaced `candidate` makes this call fail
    /// with `Mismatch`.
    pub async fn rotate_refresh_token(
        &self,
        candidate: &str,
        user_id: Uuid,
    ) -> Result<RefreshGrant, AuthError> {
        self.validate_refresh_token(candidate, user_id).await?;

        let grant = self.new_refresh_grant()?;
        if !self.refresh.swap(user_id, candidate, &grant).await? {
            tracing::warn!(user_id = %user_id, "Lost refresh token rotation race");
            return Err(AuthError::Mismatch);
        }

        tracing::info!(user_id = %user_id, "Refresh token rotated");
        Ok(grant)
    }

    /// Clear the user's refresh token
    pub async fn revoke_refresh_token(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.refresh.clear(user_id).await
    }

    /// Exchange an expired access token plus the matching refresh token for a new access token.
    ///
    /// A still-valid access token is returned unchanged. Only an intact token that
    /// failed solely on expiry enters the refresh path.
    pub async fn rotate_access_token(
        &self,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<AccessTokenRotation, RotationError> {
        match self.signer.verify(access_token) {
            Ok(_) => Ok(AccessTokenRotation {
                access_token: access_token.to_string(),
                rotated: false,
                refresh: None,
            }),
            Err(AuthError::Expired) => {
                let claims = self
                    .signer
                    .decode_ignoring_expiry(access_token)
                    .map_err(|e| {
                        tracing::debug!(error = %e, "Failed to decode expired access token");
                        RotationError::CannotDecodeExpired
                    })?;
                let user_id = claims.user_id();
                let presented = refresh_token.unwrap_or_default();

                let refresh = if self.rotate_refresh_token_on_use {
                    Some(self.rotate_refresh_token(presented, user_id).await?)
                } else {
                    self.validate_refresh_token(presented, user_id).await?;
                    None
                };

                let access_token = self.signer.issue(user_id)?;
                tracing::info!(user_id = %user_id, "Access token rotated");

                Ok(AccessTokenRotation {
                    access_token,
                    rotated: true,
                    refresh,
                })
            }
            Err(e) => {
                tracing::debug!(error = %e, "Rejected access token on rotation");
                Err(RotationError::InvalidAccessToken)
            }
        }
    }

    /// The store this service reads users from
    pub fn users(&self) -> &Arc<dyn UserStore> {
        &self.users
    }
}
