//! User profile API handlers
//!
//! Implements:
//! - GET /api/user/me - Get current user profile
//! - PUT /api/user/me - Update profile and savings fields
//! - GET /api/user/me/balances - Get balance and monthly saving goal

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smartspend_auth::{Currency, User};
use smartspend_common::{Error, Result, ValidatedJson};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::api::middleware::{AuthUser, UsersState};

/// Public view of a user; never includes the refresh token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfileResponse {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
    pub google_email: Option<String>,
    pub apple_email: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub balance: Decimal,
    pub monthly_saving_goal: Decimal,
    pub preferred_currency: Currency,
}

impl From<User> for UserProfileResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            first_name: user.first_name,
            last_name: user.last_name,
            username: user.username,
            google_email: user.google_email,
            apple_email: user.apple_email,
            avatar_url: user.avatar_url,
            created_at: user.created_at,
            balance: user.balance,
            monthly_saving_goal: user.monthly_saving_goal,
            preferred_currency: user.preferred_currency,
        }
    }
}

/// `{"data": ...}` wrapper shared by the read endpoints
#[derive(Debug, Serialize)]
pub struct DataEnvelope<T> {
    pub data: T,
}

/// Partial profile update; absent fields keep their stored value
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    #[validate(length(max = 100))]
    pub first_name: Option<String>,

    #[validate(length(max = 100))]
    pub last_name: Option<String>,

    #[validate(length(min = 1, max = 100))]
    pub username: Option<String>,

    #[validate(url)]
    pub avatar_url: Option<String>,

    pub balance: Option<Decimal>,

    #[validate(custom(function = "non_negative", message = "Must not be negative"))]
    pub monthly_saving_goal: Option<Decimal>,

    pub preferred_currency: Option<Currency>,
}

impl UpdateProfileRequest {
    fn apply(self, user: &mut User) {
        if let Some(first_name) = self.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = self.last_name {
            user.last_name = last_name;
        }
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(avatar_url) = self.avatar_url {
            user.avatar_url = Some(avatar_url);
        }
        if let Some(balance) = self.balance {
            user.balance = balance;
        }
        if let Some(goal) = self.monthly_saving_goal {
            user.monthly_saving_goal = goal;
        }
        if let Some(currency) = self.preferred_currency {
            user.preferred_currency = currency;
        }
    }
}

fn non_negative(value: &Decimal) -> std::result::Result<(), ValidationError> {
    if *value < Decimal::ZERO {
        return Err(ValidationError::new("non_negative"));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct UpdateProfileResponse {
    pub message: &'static str,
    pub data: UserProfileResponse,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalancesResponse {
    pub balance: Decimal,
    pub monthly_saving_goal: Decimal,
}

async fn load_caller(state: &UsersState, user_id: Uuid) -> Result<User> {
    state
        .auth
        .tokens
        .users()
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".to_string()))
}

/// GET /api/user/me - Get current user profile
pub async fn get_profile(
    AuthUser(auth_context): AuthUser,
    State(state): State<UsersState>,
) -> Result<Json<DataEnvelope<UserProfileResponse>>> {
    let user = load_caller(&state, auth_context.user_id).await?;

    Ok(Json(DataEnvelope {
        data: UserProfileResponse::from(user),
    }))
}

/// PUT /api/user/me - Update profile and savings fields
pub async fn update_profile(
    AuthUser(auth_context): AuthUser,
    State(state): State<UsersState>,
    ValidatedJson(request): ValidatedJson<UpdateProfileRequest>,
) -> Result<Json<UpdateProfileResponse>> {
    let mut user = load_caller(&state, auth_context.user_id).await?;
    request.apply(&mut user);

    state.auth.tokens.users().update_user(&user).await?;
    tracing::info!(user_id = %user.id, "User profile updated");

    Ok(Json(UpdateProfileResponse {
        message: "User information successfully updated.",
        data: UserProfileResponse::from(user),
    }))
}

/// GET /api/user/me/balances - Get balance and monthly saving goal
pub async fn get_balances(
    AuthUser(auth_context): AuthUser,
    State(state): State<UsersState>,
) -> Result<Json<DataEnvelope<BalancesResponse>>> {
    let user = load_caller(&state, auth_context.user_id).await?;

    Ok(Json(DataEnvelope {
        data: BalancesResponse {
            balance: user.balance,
            monthly_saving_goal: user.monthly_saving_goal,
        },
    }))
}
