//! Identity and token lifecycle for SmartSpend
//!
//! Issues and verifies access tokens, matches and rotates refresh tokens,
//! verifies Google and Apple identity tokens, and provides axum extractors
//! that work with any domain state implementing `FromRef<S>` for `AuthBackend`.

mod backend;
mod claims;
mod config;
mod context;
mod error;
mod extractors;
mod jwt;
pub mod providers;
mod refresh;
mod services;
mod sign_in;
mod store;
mod tokens;
mod types;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use backend::AuthBackend;
pub use claims::AccessTokenClaims;
pub use config::AuthConfig;
pub use context::AuthContext;
pub use error::{AuthError, RotationError};
pub use extractors::AuthUser;
pub use jwt::AccessTokenSigner;
pub use providers::IdentityVerifier;
pub use refresh::{generate_refresh_token, RefreshGrant, RefreshTokenStore, StoredRefreshToken};
pub use services::AuthServices;
pub use sign_in::{SignInOutcome, SignInService};
pub use store::UserStore;
pub use tokens::{AccessTokenRotation, TokenService};
pub use types::{Currency, ProviderKind, User, VerifiedIdentity};
