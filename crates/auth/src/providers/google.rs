//! Google ID token verification against one of several client audiences

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::key_set::CachedKeySet;
use super::{Audience, IdentityVerifier};
use crate::error::AuthError;
use crate::jwt::classify_jwt_error;
use crate::types::{ProviderKind, VerifiedIdentity};

pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

#[derive(Debug, Deserialize)]
struct GoogleIdTokenClaims {
    aud: Audience,
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

/// Verifies Google ID tokens for any of the configured client ids.
///
/// Audiences are tried in order and the first that validates wins.
pub struct GoogleVerifier {
    audiences: Vec<String>,
    keys: Arc<CachedKeySet>,
}

impl GoogleVerifier {
    pub fn new(audiences: Vec<String>, keys: Arc<CachedKeySet>) -> Result<Self, AuthError> {
        if audiences.is_empty() {
            return Err(AuthError::Configuration(
                "at least one Google client id is required".to_string(),
            ));
        }
        Ok(Self { audiences, keys })
    }

    fn validate_for(
        &self,
        id_token: &str,
        key: &DecodingKey,
        audience: &str,
    ) -> Result<GoogleIdTokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[audience]);
        validation.set_issuer(&GOOGLE_ISSUERS);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);

        decode::<GoogleIdTokenClaims>(id_token, key, &validation)
            .map(|data| data.claims)
            .map_err(|e| classify_jwt_error(&e))
    }

    async fn decoding_key(&self, id_token: &str) -> Result<DecodingKey, AuthError> {
        let header = decode_header(id_token).map_err(|e| {
            tracing::debug!(error = %e, "Unreadable Google ID token header");
            AuthError::InvalidToken
        })?;
        let kid = header
            .kid
            .filter(|kid| !kid.trim().is_empty())
            .ok_or(AuthError::InvalidToken)?;

        let jwk = self.keys.find(&kid).await.map_err(|e| match e {
            AuthError::UpstreamUnavailable(_) => e,
            other => {
                tracing::debug!(kid = %kid, error = %other, "Google signing key lookup failed");
                AuthError::InvalidToken
            }
        })?;

        DecodingKey::from_rsa_components(&jwk.n, &jwk.e).map_err(|e| {
            tracing::debug!(kid = %kid, error = %e, "Unusable Google signing key");
            AuthError::InvalidToken
        })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for GoogleVerifier {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Google
    }

    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, AuthError> {
        if id_token.trim().is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let key = self.decoding_key(id_token).await?;

        let mut last_error = AuthError::InvalidToken;
        let mut verified = None;
        for audience in &self.audiences {
            match self.validate_for(id_token, &key, audience) {
                Ok(claims) => {
                    tracing::info!(audience = %audience, "Google ID token matched audience");
                    verified = Some(claims);
                    break;
                }
                Err(e) => last_error = e,
            }
        }

        let claims = match verified {
            Some(claims) => claims,
            None => {
                tracing::debug!(error = %last_error, "Google ID token rejected for every audience");
                return Err(match last_error {
                    AuthError::Expired => AuthError::Expired,
                    _ => AuthError::InvalidToken,
                });
            }
        };

        if !claims.aud.contains_any(&self.audiences) {
            return Err(AuthError::AudienceMismatch);
        }

        let email = claims
            .email
            .filter(|email| !email.trim().is_empty())
            .ok_or(AuthError::MissingEmail)?;

        Ok(VerifiedIdentity {
            provider: ProviderKind::Google,
            subject: claims.sub,
            email,
            given_name: claims.given_name,
            family_name: claims.family_name,
            picture_url: claims.picture,
        })
    }
}
