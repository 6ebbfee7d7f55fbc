//! Access token signing, verification and token extraction helpers

use axum::http::HeaderValue;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use uuid::Uuid;

use crate::claims::AccessTokenClaims;
use crate::config::AuthConfig;
use crate::error::AuthError;

/// Signs and verifies SmartSpend access tokens (HS256).
pub struct AccessTokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl std::fmt::Debug for AccessTokenSigner {
    #[mutants::skip] // Redaction only, no behaviour
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessTokenSigner")
            .field("issuer", &self.issuer)
            .field("ttl", &self.ttl)
            .finish_non_exhaustive()
    }
}

impl AccessTokenSigner {
    /// Build the signer. A blank secret is a startup error.
    pub fn new(config: &AuthConfig) -> Result<Self, AuthError> {
        if config.access_token_secret.trim().is_empty() {
            return Err(AuthError::Configuration(
                "access token signing secret is not set".to_string(),
            ));
        }

        let secret = config.access_token_secret.as_bytes();
        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            issuer: config.issuer.clone(),
            ttl: config.access_token_ttl,
        })
    }

    /// Issue a token for `user_id`, valid for the configured lifetime from now
    pub fn issue(&self, user_id: Uuid) -> Result<String, AuthError> {
        self.issue_at(user_id, Utc::now())
    }

    pub(crate) fn issue_at(
        &self,
        user_id: Uuid,
        issued_at: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let claims = AccessTokenClaims {
            sub: user_id,
            iss: self.issuer.clone(),
            iat: issued_at.timestamp(),
            exp: (issued_at + self.ttl).timestamp(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!(error = %e, "Failed to sign access token");
            AuthError::Internal("failed to sign access token".to_string())
        })
    }

    /// Full verification: signature, algorithm, issuer and expiry.
    ///
    /// Returns `AuthError::Expired` only when the signature is intact.
    pub fn verify(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        let claims = self.decode_claims(token, true)?;

        if claims.exp <= Utc::now().timestamp() {
            return Err(AuthError::Expired);
        }

        Ok(claims)
    }

    /// Signature, algorithm and issuer verification without the expiry check.
    ///
    /// Used only by the rotation path once `verify` reported `Expired`.
    pub fn decode_ignoring_expiry(&self, token: &str) -> Result<AccessTokenClaims, AuthError> {
        self.decode_claims(token, false)
    }

    fn decode_claims(&self, token: &str, check_expiry: bool) -> Result<AccessTokenClaims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = check_expiry;
        validation.validate_aud = false;
        validation.set_issuer(&[&self.issuer]);
        validation.set_required_spec_claims(&["exp", "iss", "sub"]);

        let token_data =
            decode::<AccessTokenClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                tracing::debug!(error = %e, "Access token validation failed");
                classify_jwt_error(&e)
            })?;

        Ok(token_data.claims)
    }
}

/// Map a `jsonwebtoken` failure onto the auth taxonomy
pub(crate) fn classify_jwt_error(err: &jsonwebtoken::errors::Error) -> AuthError {
    match err.kind() {
        ErrorKind::ExpiredSignature => AuthError::Expired,
        ErrorKind::InvalidSignature
        | ErrorKind::InvalidAlgorithm
        | ErrorKind::InvalidAlgorithmName
        | ErrorKind::InvalidKeyFormat
        | ErrorKind::InvalidRsaKey(_) => AuthError::BadSignature,
        ErrorKind::InvalidAudience => AuthError::AudienceMismatch,
        ErrorKind::InvalidIssuer => AuthError::ClaimInvalid("invalid issuer".to_string()),
        ErrorKind::ImmatureSignature => {
            AuthError::ClaimInvalid("token not yet valid".to_string())
        }
        ErrorKind::MissingRequiredClaim(claim) => {
            AuthError::ClaimInvalid(format!("missing {} claim", claim))
        }
        _ => AuthError::Malformed(err.to_string()),
    }
}

/// Extract bearer token from Authorization header
pub(crate) fn extract_bearer_token(header: &HeaderValue) -> Result<String, AuthError> {
    let header_str = header
        .to_str()
        .map_err(|_| AuthError::InvalidAuthorizationFormat)?;

    if let Some(token) = header_str.strip_prefix("Bearer ") {
        Ok(token.to_string())
    } else {
        Err(AuthError::InvalidAuthorizationFormat)
    }
}
