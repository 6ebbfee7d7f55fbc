//! SmartSpend application composition root
//!
//! Composes the domain routers into a single application.

use std::sync::Arc;

use axum::Router;
use smartspend_auth::AuthServices;
use smartspend_common::Config;
use smartspend_users::{UserRepository, UsersState};
use sqlx::PgPool;

/// Create the main application router backed by Postgres and the live providers
pub async fn create_app(config: Config, pool: PgPool) -> Result<Router, anyhow::Error> {
    let users = Arc::new(UserRepository::new(pool));

    let auth = AuthServices::from_config(&config, users)
        .map_err(|e| anyhow::anyhow!("Failed to initialise authentication: {}", e))?;

    tracing::info!(
        google_client_ids = config.google_client_ids.len(),
        rotate_refresh_token_on_use = config.rotate_refresh_token_on_use,
        "Authentication services ready"
    );

    Ok(build_router(auth))
}

/// Router over already-wired auth services
pub fn build_router(auth: AuthServices) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check))
        .route(
            "/",
            axum::routing::get(|| async { "SmartSpend API v0.0.1-SNAPSHOT" }),
        )
        .merge(smartspend_users::routes().with_state(UsersState { auth }))
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
