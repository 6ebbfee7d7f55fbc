//! Configuration management following 12-factor app principles
//!
//! All configuration is loaded from environment variables once at startup
//! and is immutable afterwards.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::env;

const DEFAULT_ISSUER: &str = "Smart Spend Team";
const DEFAULT_GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";
const DEFAULT_APPLE_KEYS_URL: &str = "https://appleid.apple.com/auth/keys";

#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Database connection URL (PostgreSQL)
    pub database_url: String,

    /// Access token signing
    pub access_token_secret: String,
    pub access_token_issuer: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_days: i64,
    pub rotate_refresh_token_on_use: bool,

    /// Google sign-in: accepted audiences in the order they are tried
    pub google_client_ids: Vec<String>,
    pub google_certs_url: String,

    /// Apple sign-in
    pub apple_client_id: String,
    pub apple_keys_url: String,

    /// Remote key-set handling
    pub key_set_cache_ttl_secs: u64,
    pub key_set_fetch_timeout_secs: u64,
    /// Floor between two fetches of the same key set, whatever the lookups ask for
    pub key_set_min_refresh_interval_secs: u64,

    /// Runtime configuration
    pub rust_log: String,
    pub port: u16,
}

impl std::fmt::Debug for Config {
    #[mutants::skip] // Redaction only, no behaviour
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("access_token_issuer", &self.access_token_issuer)
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_days", &self.refresh_token_ttl_days)
            .field("rotate_refresh_token_on_use", &self.rotate_refresh_token_on_use)
            .field("google_client_ids", &self.google_client_ids)
            .field("apple_client_id", &self.apple_client_id)
            .field("key_set_cache_ttl_secs", &self.key_set_cache_ttl_secs)
            .field(
                "key_set_min_refresh_interval_secs",
                &self.key_set_min_refresh_interval_secs,
            )
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if it exists

        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| anyhow::anyhow!("{} is required", key))
        };

        let mut google_client_ids: Vec<String> = ["GOOGLE_WEB_CLIENT_ID", "GOOGLE_IOS_CLIENT_ID"]
            .iter()
            .filter_map(|key| lookup(key))
            .collect();
        if let Some(extra) = lookup("GOOGLE_CLIENT_IDS") {
            google_client_ids.extend(extra.split(',').map(|id| id.trim().to_string()));
        }
        google_client_ids.retain(|id| !id.trim().is_empty());
        google_client_ids.dedup();
        if google_client_ids.is_empty() {
            return Err(anyhow::anyhow!(
                "at least one of GOOGLE_WEB_CLIENT_ID, GOOGLE_IOS_CLIENT_ID or GOOGLE_CLIENT_IDS is required"
            ));
        }

        let config = Self {
            database_url: required("DATABASE_URL")?,

            access_token_secret: required("ACCESS_TOKEN_SECRET_KEY")?,
            access_token_issuer: lookup("ACCESS_TOKEN_ISSUER")
                .unwrap_or_else(|| DEFAULT_ISSUER.to_string()),
            access_token_ttl_minutes: parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", 30)?,
            refresh_token_ttl_days: parse_or(&lookup, "REFRESH_TOKEN_TTL_DAYS", 30)?,
            rotate_refresh_token_on_use: parse_or(&lookup, "ROTATE_REFRESH_TOKEN_ON_USE", false)?,

            google_client_ids,
            google_certs_url: lookup("GOOGLE_CERTS_URL")
                .unwrap_or_else(|| DEFAULT_GOOGLE_CERTS_URL.to_string()),

            apple_client_id: required("APPLE_CLIENT_ID")?,
            apple_keys_url: lookup("APPLE_KEYS_URL")
                .unwrap_or_else(|| DEFAULT_APPLE_KEYS_URL.to_string()),

            key_set_cache_ttl_secs: parse_or(&lookup, "KEY_SET_CACHE_TTL_SECS", 3600)?,
            key_set_fetch_timeout_secs: parse_or(&lookup, "KEY_SET_FETCH_TIMEOUT_SECS", 5)?,
            key_set_min_refresh_interval_secs: parse_or(
                &lookup,
                "KEY_SET_MIN_REFRESH_INTERVAL_SECS",
                10,
            )?,

            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "smartspend=debug".to_string()),
            port: parse_or(&lookup, "PORT", 8080)?,
        };

        if config.access_token_ttl_minutes <= 0 || config.refresh_token_ttl_days <= 0 {
            return Err(anyhow::anyhow!("token lifetimes must be positive"));
        }

        Ok(config)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: {}", key, raw)),
        None => Ok(default),
    }
}
