//! Route definitions for Users domain API

use axum::{
    routing::{get, post},
    Router,
};

use super::handlers::{auth, token, users};
use super::middleware::UsersState;

/// Sign-in and logout routes
fn auth_routes() -> Router<UsersState> {
    Router::new()
        .route("/api/auth/google", post(auth::google_sign_in))
        .route("/api/auth/apple", post(auth::apple_sign_in))
        .route("/api/auth/logout", post(auth::logout))
}

/// Access token rotation
fn token_routes() -> Router<UsersState> {
    Router::new().route("/api/token", post(token::rotate_access_token))
}

fn user_routes() -> Router<UsersState> {
    Router::new()
        .route(
            "/api/user/me",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/api/user/me/balances", get(users::get_balances))
}

/// Create all Users domain API routes
pub fn routes() -> Router<UsersState> {
    Router::new()
        .merge(auth_routes())
        .merge(token_routes())
        .merge(user_routes())
}
