//! Third-party identity token verification

mod apple;
mod google;
mod key_set;

pub use apple::{AppleVerifier, APPLE_ISSUER, MIN_RSA_KEY_BITS};
pub use google::{GoogleVerifier, GOOGLE_ISSUERS};
pub use key_set::{CachedKeySet, HttpKeySetSource, Jwk, KeySet, KeySetSource, MAX_KEY_SET_SIZE};

use serde::Deserialize;

use crate::error::AuthError;
use crate::types::{ProviderKind, VerifiedIdentity};

/// Turns a raw provider identity token into a [`VerifiedIdentity`]
#[async_trait::async_trait]
pub trait IdentityVerifier: Send + Sync {
    fn provider(&self) -> ProviderKind;

    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, AuthError>;
}

/// `aud` claim, which may be a single string or an array
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum Audience {
    Single(String),
    Multiple(Vec<String>),
}

impl Audience {
    pub(crate) fn contains(&self, value: &str) -> bool {
        match self {
            Audience::Single(aud) => aud == value,
            Audience::Multiple(auds) => auds.iter().any(|aud| aud == value),
        }
    }

    pub(crate) fn contains_any(&self, values: &[String]) -> bool {
        values.iter().any(|value| self.contains(value))
    }
}
