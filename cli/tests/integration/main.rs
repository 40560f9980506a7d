//! Integration tests for stratus CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior.
//! None of them reach the provider API.

mod cli_tests;
mod config_command;
