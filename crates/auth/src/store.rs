//! User lookup interface consumed by the token lifecycle

use chrono::{DateTime, Utc};
use smartspend_common::RepositoryError;
use uuid::Uuid;

use crate::types::{ProviderKind, User};

/// Persistence operations this crate needs on user records.
///
/// Implemented by the users domain over Postgres and, for tests, in memory.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError>;

    /// Look up by the email column of the given provider. Never matches an empty email.
    async fn find_user_by_provider_email(
        &self,
        provider: ProviderKind,
        email: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Look up by the provider's stable subject identifier. Never matches an empty subject.
    async fn find_user_by_provider_subject(
        &self,
        provider: ProviderKind,
        subject: &str,
    ) -> Result<Option<User>, RepositoryError>;

    /// Insert a new user; `AlreadyExists` when an id, email or subject is taken
    async fn save_user(&self, user: &User) -> Result<(), RepositoryError>;

    /// Overwrite the profile and balance columns of an existing user; `NotFound` if absent.
    ///
    /// Identity and refresh-token columns are left untouched.
    async fn update_user(&self, user: &User) -> Result<(), RepositoryError>;

    /// Unconditionally replace the refresh token and its expiry; `NotFound` if absent
    async fn update_refresh_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;

    /// Replace the refresh token only if the stored value still equals `expected`.
    ///
    /// Returns `false` when the user is absent or the stored token changed.
    async fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
        new_expiry: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;
}
