//! Concrete authentication backend
//!
//! Wraps the shared `TokenService`. Domain states expose it via `FromRef`:
//! ```ignore
//! impl FromRef<MyDomainState> for AuthBackend {
//!     fn from_ref(state: &MyDomainState) -> Self {
//!         state.auth.clone()
//!     }
//! }
//! ```

use std::sync::Arc;

use crate::context::AuthContext;
use crate::error::AuthError;
use crate::tokens::TokenService;

#[derive(Clone)]
pub struct AuthBackend {
    tokens: Arc<TokenService>,
}

impl AuthBackend {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Verify a bearer access token.
    ///
    /// Expiry stays distinguishable so clients know to call the rotation
    /// endpoint; every other failure collapses to `InvalidToken`.
    pub(crate) fn authenticate_jwt(&self, token: &str) -> Result<AuthContext, AuthError> {
        match self.tokens.verify_access_token(token) {
            Ok(claims) => Ok(AuthContext::new(claims)),
            Err(AuthError::Expired) => Err(AuthError::Expired),
            Err(e) => {
                tracing::debug!(error = %e, "Access token rejected");
                Err(AuthError::InvalidToken)
            }
        }
    }
}
