//! Users domain: user persistence, sign-in, logout, token rotation, profile

pub mod api;
pub mod repository;

pub use repository::UserRepository;

// Re-export API types
pub use api::routes;
pub use api::UsersState;
