//! Users domain state and auth backend integration

use axum::extract::FromRef;
use smartspend_auth::{AuthBackend, AuthServices};

// Re-export auth extractors so handlers import from a single place
pub use smartspend_auth::AuthUser;

/// Application state for the Users domain
#[derive(Clone)]
pub struct UsersState {
    pub auth: AuthServices,
}

impl FromRef<UsersState> for AuthBackend {
    fn from_ref(state: &UsersState) -> Self {
        state.auth.backend.clone()
    }
}
