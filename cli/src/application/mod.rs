//! Application layer: port trait definitions and use-case orchestration.
//!
//! Depends only on `crate::domain` and `crate::engine`, never on
//! `crate::infra` or `crate::commands`.

pub mod ports;
pub mod services;

pub use ports::{
    CloudProvider, CommandOutput, CommandRunner, ConfigStore, KeySource, NetworkProbe,
    ProgressReporter, RemoteShell, RemoteTarget,
};
