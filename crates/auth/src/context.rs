//! Authorization context for authenticated requests

use uuid::Uuid;

use crate::claims::AccessTokenClaims;

/// Identity attached to a request whose access token verified
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub claims: AccessTokenClaims,
}

impl AuthContext {
    pub fn new(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.user_id(),
            claims,
        }
    }
}
