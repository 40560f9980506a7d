//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::time::Duration;

use thiserror::Error;

// ── Deploy errors ─────────────────────────────────────────────────────────────

/// Errors raised while declaring or running a deployment plan.
#[derive(Debug, Error)]
pub enum DeployError {
    /// A named external entity (SSH key, domain) does not exist.
    #[error("{kind} '{name}' not found")]
    Lookup { kind: &'static str, name: String },

    #[error("private key {path} is unavailable: {reason}")]
    CredentialUnavailable { path: String, reason: String },

    /// The provider rejected a descriptor or provisioning failed.
    #[error("provisioning '{resource}' failed: {message}")]
    Provider { resource: String, message: String },

    #[error("cannot convert '{value}' to {target}")]
    Conversion { value: String, target: &'static str },

    /// A chained remote command or file copy failed.
    #[error("remote step '{step}' failed: {message}")]
    RemoteExec { step: String, message: String },

    #[error("host {host} did not accept connections within {}s", waited.as_secs())]
    Unreachable { host: String, waited: Duration },

    #[error("a node named '{0}' is already declared")]
    DuplicateName(String),

    #[error("an export named '{0}' is already registered")]
    DuplicateExport(String),

    #[error("'{node}' depends on a node that is not part of this plan")]
    UnknownPredecessor { node: String },

    /// A remote-shell step with more than one remote-shell predecessor.
    #[error("remote step '{step}' must follow at most one remote step, got: {}", predecessors.join(", "))]
    ChainViolation {
        step: String,
        predecessors: Vec<String>,
    },

    #[error("'{node}' finished without producing a value")]
    Abandoned { node: String },
}

impl DeployError {
    /// Stable machine-readable identifier, used in JSON error output.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::Lookup { .. } => "lookup_failed",
            Self::CredentialUnavailable { .. } => "credential_unavailable",
            Self::Provider { .. } => "provider_failed",
            Self::Conversion { .. } => "conversion_failed",
            Self::RemoteExec { .. } => "remote_step_failed",
            Self::Unreachable { .. } => "unreachable",
            Self::DuplicateName(_) => "duplicate_name",
            Self::DuplicateExport(_) => "duplicate_export",
            Self::UnknownPredecessor { .. } => "unknown_predecessor",
            Self::ChainViolation { .. } => "chain_violation",
            Self::Abandoned { .. } => "abandoned",
        }
    }
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing setting: {key}\n\nSet it in the config file (see 'stratus config path').")]
    Missing { key: &'static str },

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: &'static str,
        value: String,
        valid: String,
    },
}
