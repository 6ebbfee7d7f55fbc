//! User repository
//!
//! Uses runtime `sqlx::query_as` with a row type converted into the
//! `smartspend_auth::User` record.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use smartspend_auth::{Currency, ProviderKind, User, UserStore};
use smartspend_common::RepositoryError;
use sqlx::PgPool;
use uuid::Uuid;

const USER_COLUMNS: &str = r#"
    id, first_name, last_name, username, google_email, apple_email,
    google_subject, apple_subject, refresh_token, refresh_token_expires_at,
    avatar_url, created_at, balance, monthly_saving_goal, preferred_currency
"#;

#[derive(sqlx::FromRow)]
struct UserRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    username: String,
    google_email: Option<String>,
    apple_email: Option<String>,
    google_subject: Option<String>,
    apple_subject: Option<String>,
    refresh_token: String,
    refresh_token_expires_at: DateTime<Utc>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    balance: Decimal,
    monthly_saving_goal: Decimal,
    preferred_currency: String,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let preferred_currency: Currency = row
            .preferred_currency
            .parse()
            .map_err(RepositoryError::InvalidData)?;

        Ok(User {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            username: row.username,
            google_email: row.google_email,
            apple_email: row.apple_email,
            google_subject: row.google_subject,
            apple_subject: row.apple_subject,
            refresh_token: row.refresh_token,
            refresh_token_expires_at: row.refresh_token_expires_at,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            balance: row.balance,
            monthly_saving_goal: row.monthly_saving_goal,
            preferred_currency,
        })
    }
}

fn email_column(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Google => "google_email",
        ProviderKind::Apple => "apple_email",
    }
}

fn subject_column(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Google => "google_subject",
        ProviderKind::Apple => "apple_subject",
    }
}

#[derive(Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl UserStore for UserRepository {
    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, RepositoryError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, user_id = %id, "Failed to load user");
                RepositoryError::from(e)
            })?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_provider_email(
        &self,
        provider: ProviderKind,
        email: &str,
    ) -> Result<Option<User>, RepositoryError> {
        if email.is_empty() {
            return Ok(None);
        }

        let query = format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS,
            email_column(provider)
        );
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, provider = %provider, "Failed to look up user by email");
                RepositoryError::from(e)
            })?;

        row.map(User::try_from).transpose()
    }

    async fn find_user_by_provider_subject(
        &self,
        provider: ProviderKind,
        subject: &str,
    ) -> Result<Option<User>, RepositoryError> {
        if subject.is_empty() {
            return Ok(None);
        }

        let query = format!(
            "SELECT {} FROM users WHERE {} = $1",
            USER_COLUMNS,
            subject_column(provider)
        );
        let row: Option<UserRow> = sqlx::query_as(&query)
            .bind(subject)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!(error = %e, provider = %provider, "Failed to look up user by subject");
                RepositoryError::from(e)
            })?;

        row.map(User::try_from).transpose()
    }

    async fn save_user(&self, user: &User) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO users (
                id, first_name, last_name, username, google_email, apple_email,
                google_subject, apple_subject, refresh_token, refresh_token_expires_at,
                avatar_url, created_at, balance, monthly_saving_goal, preferred_currency
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.google_email)
        .bind(&user.apple_email)
        .bind(&user.google_subject)
        .bind(&user.apple_subject)
        .bind(&user.refresh_token)
        .bind(user.refresh_token_expires_at)
        .bind(&user.avatar_url)
        .bind(user.created_at)
        .bind(user.balance)
        .bind(user.monthly_saving_goal)
        .bind(user.preferred_currency.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user.id, "Failed to insert user");
            RepositoryError::from(e)
        })?;

        Ok(())
    }

    async fn update_user(&self, user: &User) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                first_name = $2,
                last_name = $3,
                username = $4,
                avatar_url = $5,
                balance = $6,
                monthly_saving_goal = $7,
                preferred_currency = $8
            WHERE id = $1
            "#,
        )
        .bind(user.id)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.username)
        .bind(&user.avatar_url)
        .bind(user.balance)
        .bind(user.monthly_saving_goal)
        .bind(user.preferred_currency.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %user.id, "Failed to update user");
            RepositoryError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn update_refresh_token(
        &self,
        id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $2, refresh_token_expires_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %id, "Failed to store refresh token");
            RepositoryError::from(e)
        })?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }
        Ok(())
    }

    async fn compare_and_swap_refresh_token(
        &self,
        id: Uuid,
        expected: &str,
        new_token: &str,
        new_expiry: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET
                refresh_token = $3,
                refresh_token_expires_at = $4
            WHERE id = $1 AND refresh_token = $2 AND refresh_token <> ''
            "#,
        )
        .bind(id)
        .bind(expected)
        .bind(new_token)
        .bind(new_expiry)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, user_id = %id, "Failed to rotate refresh token");
            RepositoryError::from(e)
        })?;

        Ok(result.rows_affected() == 1)
    }
}
