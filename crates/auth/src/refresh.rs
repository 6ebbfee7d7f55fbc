//! Refresh token generation and the refresh-token field of a user record

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use smartspend_common::RepositoryError;
use uuid::Uuid;

use crate::error::AuthError;
use crate::store::UserStore;

/// Bytes of OS entropy per refresh token (hex-encoded to 128 characters)
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Generate a refresh token: 64 random bytes from the OS, hex-encoded
pub fn generate_refresh_token() -> Result<String, AuthError> {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    getrandom::getrandom(&mut bytes)
        .map_err(|e| AuthError::Internal(format!("Failed to generate random bytes: {}", e)))?;
    Ok(hex::encode(bytes))
}

/// A freshly issued refresh token and its expiry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RefreshGrant {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl RefreshGrant {
    pub fn issue(ttl: Duration) -> Result<Self, AuthError> {
        Ok(Self {
            token: generate_refresh_token()?,
            expires_at: Utc::now() + ttl,
        })
    }
}

/// Stored refresh token state for one user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRefreshToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Reads and writes the single refresh token + expiry pair on a user record.
#[derive(Clone)]
pub struct RefreshTokenStore {
    users: Arc<dyn UserStore>,
}

impl RefreshTokenStore {
    pub fn new(users: Arc<dyn UserStore>) -> Self {
        Self { users }
    }

    /// `None` when the user does not exist
    pub async fn read(&self, user_id: Uuid) -> Result<Option<StoredRefreshToken>, AuthError> {
        let user = self.users.find_user_by_id(user_id).await?;
        Ok(user.map(|u| StoredRefreshToken {
            token: u.refresh_token,
            expires_at: u.refresh_token_expires_at,
        }))
    }

    /// Unconditionally replace the stored token (login)
    pub async fn write(&self, user_id: Uuid, grant: &RefreshGrant) -> Result<(), AuthError> {
        self.put(user_id, &grant.token, grant.expires_at).await
    }

    /// Clear the stored token and zero its expiry (logout). Idempotent.
    pub async fn clear(&self, user_id: Uuid) -> Result<(), AuthError> {
        let stored = self.read(user_id).await?.ok_or(AuthError::NotFound)?;

        if stored.token.is_empty() && stored.expires_at == DateTime::<Utc>::UNIX_EPOCH {
            return Ok(());
        }

        self.put(user_id, "", DateTime::<Utc>::UNIX_EPOCH).await
    }

    async fn put(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), AuthError> {
        match self.users.update_refresh_token(user_id, token, expires_at).await {
            Ok(()) => Ok(()),
            Err(RepositoryError::NotFound) => Err(AuthError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Atomically replace `expected` with `grant`; `false` if another writer got there first
    pub async fn swap(
        &self,
        user_id: Uuid,
        expected: &str,
        grant: &RefreshGrant,
    ) -> Result<bool, AuthError> {
        let swapped = self
            .users
            .compare_and_swap_refresh_token(user_id, expected, &grant.token, grant.expires_at)
            .await?;
        Ok(swapped)
    }
}
