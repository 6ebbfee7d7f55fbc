//! Wiring of the token lifecycle and provider verifiers

use std::sync::Arc;
use std::time::Duration;

use smartspend_common::Config;

use crate::backend::AuthBackend;
use crate::config::AuthConfig;
use crate::error::AuthError;
use crate::providers::{AppleVerifier, CachedKeySet, GoogleVerifier, HttpKeySetSource, IdentityVerifier};
use crate::sign_in::SignInService;
use crate::store::UserStore;
use crate::tokens::TokenService;

/// Everything the HTTP layer needs, built once at startup
#[derive(Clone)]
pub struct AuthServices {
    pub backend: AuthBackend,
    pub tokens: Arc<TokenService>,
    pub sign_in: SignInService,
    pub google: Arc<dyn IdentityVerifier>,
    pub apple: Arc<dyn IdentityVerifier>,
}

impl AuthServices {
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn UserStore>,
        google: Arc<dyn IdentityVerifier>,
        apple: Arc<dyn IdentityVerifier>,
    ) -> Result<Self, AuthError> {
        let tokens = Arc::new(TokenService::new(config, users)?);
        Ok(Self {
            backend: AuthBackend::new(tokens.clone()),
            sign_in: SignInService::new(tokens.clone()),
            tokens,
            google,
            apple,
        })
    }

    /// Production wiring: verifiers backed by the providers' published key sets
    pub fn from_config(config: &Config, users: Arc<dyn UserStore>) -> Result<Self, AuthError> {
        let timeout = Duration::from_secs(config.key_set_fetch_timeout_secs);
        let ttl = Duration::from_secs(config.key_set_cache_ttl_secs);
        let min_refresh_interval = Duration::from_secs(config.key_set_min_refresh_interval_secs);

        let key_set = |url: &str| {
            Arc::new(
                CachedKeySet::new(Arc::new(HttpKeySetSource::new(url, timeout)), ttl)
                    .with_min_refresh_interval(min_refresh_interval),
            )
        };
        let google_keys = key_set(&config.google_certs_url);
        let apple_keys = key_set(&config.apple_keys_url);

        let google = GoogleVerifier::new(config.google_client_ids.clone(), google_keys)?;
        let apple = AppleVerifier::new(&config.apple_client_id, apple_keys)?;

        Self::new(
            &AuthConfig::from_config(config),
            users,
            Arc::new(google),
            Arc::new(apple),
        )
    }
}
