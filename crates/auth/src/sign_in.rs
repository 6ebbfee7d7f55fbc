//! Find-or-create of local users from verified identities

use std::sync::Arc;

use chrono::{DateTime, Utc};
use smartspend_common::RepositoryError;
use uuid::Uuid;

use crate::error::AuthError;
use crate::tokens::TokenService;
use crate::types::{User, VerifiedIdentity};

/// Result of a successful sign-in or sign-up
#[derive(Debug, Clone)]
pub struct SignInOutcome {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub is_new_user: bool,
}

#[derive(Clone)]
pub struct SignInService {
    tokens: Arc<TokenService>,
}

impl SignInService {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    /// Log in the user owning the identity's provider subject or email, or create one.
    ///
    /// Either way a new refresh token replaces whatever was stored before.
    pub async fn sign_in_or_sign_up(
        &self,
        identity: &VerifiedIdentity,
    ) -> Result<SignInOutcome, AuthError> {
        let (user, is_new_user) = match self.find_existing(identity).await? {
            Some(user) => (self.log_in(user, identity).await?, false),
            None => self.sign_up(identity).await?,
        };

        let access_token = self.tokens.issue_access_token(user.id)?;

        Ok(SignInOutcome {
            refresh_token: user.refresh_token.clone(),
            refresh_token_expires_at: user.refresh_token_expires_at,
            user,
            access_token,
            is_new_user,
        })
    }

    /// Subject match first; email only for records that predate stored subjects
    async fn find_existing(&self, identity: &VerifiedIdentity) -> Result<Option<User>, AuthError> {
        let users = self.tokens.users();
        if let Some(user) = users
            .find_user_by_provider_subject(identity.provider, &identity.subject)
            .await?
        {
            return Ok(Some(user));
        }
        Ok(users
            .find_user_by_provider_email(identity.provider, &identity.email)
            .await?)
    }

    async fn log_in(&self, mut user: User, identity: &VerifiedIdentity) -> Result<User, AuthError> {
        let grant = self.tokens.grant_refresh_token(user.id).await?;
        user.refresh_token = grant.token;
        user.refresh_token_expires_at = grant.expires_at;
        tracing::info!(user_id = %user.id, provider = %identity.provider, "User logged in");
        Ok(user)
    }

    async fn sign_up(&self, identity: &VerifiedIdentity) -> Result<(User, bool), AuthError> {
        let grant = self.tokens.new_refresh_grant()?;
        let mut user = User::from_identity(identity);
        user.refresh_token = grant.token;
        user.refresh_token_expires_at = grant.expires_at;

        match self.tokens.users().save_user(&user).await {
            Ok(()) => {
                tracing::info!(user_id = %user.id, provider = %identity.provider, "User signed up");
                Ok((user, true))
            }
            Err(RepositoryError::AlreadyExists) => {
                // A concurrent sign-up with the same identity committed first
                let existing = self
                    .find_existing(identity)
                    .await?
                    .ok_or(AuthError::Storage(RepositoryError::AlreadyExists))?;
                tracing::info!(user_id = %existing.id, "Sign-up raced an existing insert, logging in");
                Ok((self.log_in(existing, identity).await?, false))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Clear the user's refresh token. Logging out twice is not an error.
    pub async fn logout(&self, user_id: Uuid) -> Result<(), AuthError> {
        self.tokens.revoke_refresh_token(user_id).await?;
        tracing::info!(user_id = %user_id, "User logged out");
        Ok(())
    }
}
