//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod resource;
pub mod secret;

pub use config::{DeployConfig, SettlePolicy};
pub use error::{ConfigError, DeployError};
pub use secret::PrivateKey;
