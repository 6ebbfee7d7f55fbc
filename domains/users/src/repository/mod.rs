//! Repository implementations for the Users domain

pub mod users;

pub use users::UserRepository;
