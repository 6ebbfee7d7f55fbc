//! HTTP handlers for the Users domain

pub mod auth;
pub mod token;
pub mod users;
