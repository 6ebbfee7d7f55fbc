//! Shared utilities, configuration, and error handling for SmartSpend
//!
//! This crate provides common functionality used across the SmartSpend services:
//! - Configuration management following 12-factor principles
//! - Error types and handling
//! - Request extractors
//! - Constant-time comparison for secrets

pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;

pub use config::Config;
pub use crypto::constant_time_eq;
pub use db::RepositoryError;
pub use error::{Error, Result};
pub use extractors::ValidatedJson;
