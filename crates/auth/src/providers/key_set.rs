//! Published signing key sets (JWKS) with a time-bounded cache

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use crate::error::AuthError;

/// Upper bound on a key set response body
pub const MAX_KEY_SET_SIZE: usize = 1 << 20;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySet {
    pub keys: Vec<Jwk>,
}

/// One published key. `n` and `e` are base64url-encoded big-endian integers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    pub kty: String,
    #[serde(default)]
    pub kid: String,
    #[serde(rename = "use", default)]
    pub use_: String,
    #[serde(default)]
    pub alg: String,
    #[serde(default)]
    pub n: String,
    #[serde(default)]
    pub e: String,
}

/// Where a key set comes from
#[async_trait::async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<KeySet, AuthError>;
}

/// Fetches a key set over HTTPS.
///
/// Transport errors, non-200 responses, oversized and undecodable payloads all
/// surface as `UpstreamUnavailable`.
pub struct HttpKeySetSource {
    url: String,
    client: reqwest::Client,
}

impl HttpKeySetSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            url: url.into(),
            client,
        }
    }
}

#[async_trait::async_trait]
impl KeySetSource for HttpKeySetSource {
    async fn fetch(&self) -> Result<KeySet, AuthError> {
        let response = self.client.get(&self.url).send().await.map_err(|e| {
            AuthError::UpstreamUnavailable(format!("failed to fetch {}: {}", self.url, e))
        })?;

        if response.status() != StatusCode::OK {
            return Err(AuthError::UpstreamUnavailable(format!(
                "{} returned status {}",
                self.url,
                response.status()
            )));
        }

        let payload = response.bytes().await.map_err(|e| {
            AuthError::UpstreamUnavailable(format!("failed to read {}: {}", self.url, e))
        })?;
        if payload.len() > MAX_KEY_SET_SIZE {
            return Err(AuthError::UpstreamUnavailable(format!(
                "key set too large: {} bytes",
                payload.len()
            )));
        }

        serde_json::from_slice(&payload)
            .map_err(|e| AuthError::UpstreamUnavailable(format!("failed to decode key set: {}", e)))
    }
}

#[derive(Default)]
struct CacheState {
    keys: HashMap<String, Jwk>,
    last_fetch: Option<Instant>,
    last_refresh_attempt: Option<Instant>,
}

/// Key lookup by key id over a [`KeySetSource`].
///
/// Entries are served for `ttl` after a fetch. A kid that is absent from a
/// fresh cache triggers one re-fetch before `KeyNotFound`, so provider key
/// rotation is picked up immediately. A zero `ttl` fetches on every lookup.
///
/// Fetches, successful or not, are at least `min_refresh_interval` apart.
/// Inside that window lookups are answered from whatever is cached.
pub struct CachedKeySet {
    source: Arc<dyn KeySetSource>,
    ttl: Duration,
    min_refresh_interval: Duration,
    cache: RwLock<CacheState>,
    refresh_lock: Mutex<()>,
}

impl CachedKeySet {
    pub fn new(source: Arc<dyn KeySetSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            min_refresh_interval: Duration::ZERO,
            cache: RwLock::new(CacheState::default()),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_min_refresh_interval(mut self, interval: Duration) -> Self {
        self.min_refresh_interval = interval;
        self
    }

    pub async fn find(&self, kid: &str) -> Result<Jwk, AuthError> {
        if let Some(key) = self.lookup_fresh(kid).await {
            return Ok(key);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while we waited
        if let Some(key) = self.lookup_fresh(kid).await {
            return Ok(key);
        }

        let last_attempt = self.cache.read().await.last_refresh_attempt;
        if !can_attempt(last_attempt, self.min_refresh_interval) {
            return self.lookup_throttled(kid).await;
        }

        if let Err(error) = self.refresh().await {
            let stale = self.cache.read().await.keys.get(kid).cloned();
            return match stale {
                Some(key) => {
                    tracing::warn!(kid = %kid, error = %error, "Key set refresh failed, using cached key");
                    Ok(key)
                }
                None => Err(error),
            };
        }

        self.cache
            .read()
            .await
            .keys
            .get(kid)
            .cloned()
            .ok_or_else(|| AuthError::KeyNotFound(kid.to_string()))
    }

    async fn lookup_fresh(&self, kid: &str) -> Option<Jwk> {
        let cache = self.cache.read().await;
        if is_stale(cache.last_fetch, self.ttl) {
            return None;
        }
        cache.keys.get(kid).cloned()
    }

    /// Answer from the cache, stale or not, while refetching is not allowed
    async fn lookup_throttled(&self, kid: &str) -> Result<Jwk, AuthError> {
        let cache = self.cache.read().await;
        if let Some(key) = cache.keys.get(kid) {
            return Ok(key.clone());
        }

        tracing::debug!(kid = %kid, "Key set refresh throttled");
        if cache.last_fetch.is_none() {
            return Err(AuthError::UpstreamUnavailable(
                "key set not yet available".to_string(),
            ));
        }
        Err(AuthError::KeyNotFound(kid.to_string()))
    }

    async fn refresh(&self) -> Result<(), AuthError> {
        self.cache.write().await.last_refresh_attempt = Some(Instant::now());

        let key_set = self.source.fetch().await?;
        let keys: HashMap<String, Jwk> = key_set
            .keys
            .into_iter()
            .map(|key| (key.kid.clone(), key))
            .collect();

        tracing::debug!(count = keys.len(), "Key set refreshed");

        let mut cache = self.cache.write().await;
        cache.keys = keys;
        cache.last_fetch = Some(Instant::now());
        Ok(())
    }
}

fn is_stale(last_fetch: Option<Instant>, ttl: Duration) -> bool {
    match last_fetch {
        Some(last_fetch) => ttl.is_zero() || last_fetch.elapsed() > ttl,
        None => true,
    }
}

fn can_attempt(last_attempt: Option<Instant>, min_interval: Duration) -> bool {
    match last_attempt {
        None => true,
        Some(ts) => ts.elapsed() >= min_interval,
    }
}
