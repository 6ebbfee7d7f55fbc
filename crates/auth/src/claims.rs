//! JWT claims types

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by a SmartSpend access token.
///
/// Only ever handed out after signature and algorithm checks have passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Issuer
    pub iss: String,
    /// Issued at (seconds since epoch)
    pub iat: i64,
    /// Expires at (seconds since epoch)
    pub exp: i64,
}

impl AccessTokenClaims {
    pub fn user_id(&self) -> Uuid {
        self.sub
    }
}
