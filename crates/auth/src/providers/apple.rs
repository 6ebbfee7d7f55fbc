//! Sign in with Apple identity token verification
//!
//! Every step aborts with its own reason. The header is inspected before any
//! key material is fetched, the key is checked before it is used, and claims
//! are only read after the signature verified against that key.

use std::collections::HashSet;
use std::sync::Arc;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::Utc;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::key_set::{CachedKeySet, Jwk};
use super::{Audience, IdentityVerifier};
use crate::error::AuthError;
use crate::jwt::classify_jwt_error;
use crate::types::{ProviderKind, VerifiedIdentity};

pub const APPLE_ISSUER: &str = "https://appleid.apple.com";

/// Smallest RSA modulus accepted for identity token signatures
pub const MIN_RSA_KEY_BITS: usize = 2048;

#[derive(Debug, Deserialize)]
struct AppleIdTokenClaims {
    iss: Option<String>,
    aud: Option<Audience>,
    exp: Option<i64>,
    iat: Option<i64>,
    nbf: Option<i64>,
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

pub struct AppleVerifier {
    client_id: String,
    keys: Arc<CachedKeySet>,
}

impl AppleVerifier {
    pub fn new(client_id: impl Into<String>, keys: Arc<CachedKeySet>) -> Result<Self, AuthError> {
        let client_id = client_id.into();
        if client_id.trim().is_empty() {
            return Err(AuthError::Configuration(
                "Apple client id is required".to_string(),
            ));
        }
        Ok(Self { client_id, keys })
    }

    fn check_claims(&self, claims: AppleIdTokenClaims) -> Result<VerifiedIdentity, AuthError> {
        let now = Utc::now().timestamp();

        if claims.iss.as_deref() != Some(APPLE_ISSUER) {
            return Err(AuthError::ClaimInvalid("invalid issuer".to_string()));
        }

        match &claims.aud {
            Some(aud) if aud.contains(&self.client_id) => {}
            _ => return Err(AuthError::AudienceMismatch),
        }

        match claims.exp {
            Some(exp) if exp > now => {}
            Some(_) => return Err(AuthError::Expired),
            None => return Err(AuthError::ClaimInvalid("missing exp claim".to_string())),
        }

        match claims.iat {
            Some(iat) if iat <= now => {}
            Some(_) => {
                return Err(AuthError::ClaimInvalid(
                    "token issued in the future".to_string(),
                ))
            }
            None => return Err(AuthError::ClaimInvalid("missing iat claim".to_string())),
        }

        if matches!(claims.nbf, Some(nbf) if nbf > now) {
            return Err(AuthError::ClaimInvalid("token not yet valid".to_string()));
        }

        let subject = claims
            .sub
            .filter(|sub| !sub.trim().is_empty())
            .ok_or_else(|| AuthError::ClaimInvalid("missing subject".to_string()))?;

        Ok(VerifiedIdentity {
            provider: ProviderKind::Apple,
            subject,
            email: claims.email.unwrap_or_default(),
            given_name: None,
            family_name: None,
            picture_url: None,
        })
    }
}

#[async_trait::async_trait]
impl IdentityVerifier for AppleVerifier {
    fn provider(&self) -> ProviderKind {
        ProviderKind::Apple
    }

    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, AuthError> {
        if id_token.trim().is_empty() {
            return Err(AuthError::Malformed("empty token".to_string()));
        }

        // Header only, nothing verified yet
        let header =
            decode_header(id_token).map_err(|e| AuthError::Malformed(e.to_string()))?;
        if header.alg != Algorithm::RS256 {
            return Err(AuthError::BadSignature);
        }
        if header.typ.as_deref() != Some("JWT") {
            return Err(AuthError::Malformed("unexpected token type".to_string()));
        }
        let kid = header
            .kid
            .filter(|kid| !kid.trim().is_empty())
            .ok_or_else(|| AuthError::Malformed("missing kid header".to_string()))?;

        let jwk = self.keys.find(&kid).await?;
        let key = rsa_decoding_key(&jwk)?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims = HashSet::new();

        let claims = decode::<AppleIdTokenClaims>(id_token, &key, &validation)
            .map_err(|e| {
                tracing::debug!(kid = %kid, error = %e, "Apple ID token signature check failed");
                classify_jwt_error(&e)
            })?
            .claims;

        let identity = self.check_claims(claims)?;
        tracing::debug!(kid = %kid, "Apple ID token verified");
        Ok(identity)
    }
}

/// Build an RS256 verification key from a published key, enforcing type and strength
pub(crate) fn rsa_decoding_key(jwk: &Jwk) -> Result<DecodingKey, AuthError> {
    if jwk.kty != "RSA" {
        return Err(AuthError::KeyRejected(format!("unexpected key type {}", jwk.kty)));
    }
    if jwk.alg != "RS256" {
        return Err(AuthError::KeyRejected(format!(
            "unexpected key algorithm {}",
            jwk.alg
        )));
    }

    let modulus = decode_component(&jwk.n, "modulus")?;
    let exponent = decode_component(&jwk.e, "exponent")?;

    let modulus = strip_leading_zeros(&modulus);
    if modulus.is_empty() {
        return Err(AuthError::KeyRejected("modulus is not positive".to_string()));
    }

    let exponent = strip_leading_zeros(&exponent);
    if exponent.len() > 4 {
        return Err(AuthError::KeyRejected("exponent too large".to_string()));
    }
    if exponent.is_empty() {
        return Err(AuthError::KeyRejected("exponent is not positive".to_string()));
    }

    let bits = bit_length(modulus);
    if bits < MIN_RSA_KEY_BITS {
        return Err(AuthError::WeakKey(bits));
    }

    DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
        .map_err(|e| AuthError::KeyRejected(e.to_string()))
}

fn decode_component(value: &str, name: &str) -> Result<Vec<u8>, AuthError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| AuthError::KeyRejected(format!("undecodable {}: {}", name, e)))?;
    if bytes.is_empty() {
        return Err(AuthError::KeyRejected(format!("empty {}", name)));
    }
    Ok(bytes)
}

fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Bit length of a big-endian integer without leading zero bytes
fn bit_length(bytes: &[u8]) -> usize {
    match bytes.first() {
        Some(first) => (bytes.len() - 1) * 8 + (8 - first.leading_zeros() as usize),
        None => 0,
    }
}
