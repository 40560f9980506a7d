//! Application services: use-case orchestration.
//!
//! Each service module composes domain logic and engine nodes with port trait
//! calls. Services import only from `crate::domain`, `crate::engine` and
//! `crate::application::ports`, never from `crate::infra` or
//! `crate::commands`.

pub mod activation;
pub mod connection;
pub mod settle;
pub mod stack;
