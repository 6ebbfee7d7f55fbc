//! Authentication configuration

use chrono::Duration;
use smartspend_common::Config;

/// Token lifecycle configuration, fixed at startup.
#[derive(Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub issuer: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    /// Issue a fresh refresh token whenever an expired access token is rotated
    pub rotate_refresh_token_on_use: bool,
}

impl AuthConfig {
    pub fn new(access_token_secret: impl Into<String>) -> Self {
        Self {
            access_token_secret: access_token_secret.into(),
            issuer: "Smart Spend Team".to_string(),
            access_token_ttl: Duration::minutes(30),
            refresh_token_ttl: Duration::days(30),
            rotate_refresh_token_on_use: false,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            access_token_secret: config.access_token_secret.clone(),
            issuer: config.access_token_issuer.clone(),
            access_token_ttl: Duration::minutes(config.access_token_ttl_minutes),
            refresh_token_ttl: Duration::days(config.refresh_token_ttl_days),
            rotate_refresh_token_on_use: config.rotate_refresh_token_on_use,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    #[mutants::skip] // Redaction only, no behaviour
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("access_token_ttl", &self.access_token_ttl)
            .field("refresh_token_ttl", &self.refresh_token_ttl)
            .field("rotate_refresh_token_on_use", &self.rotate_refresh_token_on_use)
            .finish()
    }
}
