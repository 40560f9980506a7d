//! JSON output helpers.
//!
//! `JsonRenderer` prints one pretty-printed JSON document per command.
//! [`format_error`] is used by every `--json` code path when a command fails.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::domain::{ConfigError, DeployConfig, DeployError};
use crate::engine::{Failure, PlannedNode};

/// Renders command results as JSON on stdout.
pub struct JsonRenderer;

impl JsonRenderer {
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_version(&self, version: &str) -> Result<()> {
        print_pretty(&serde_json::json!({ "version": version }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_plan(&self, steps: &[PlannedNode], exports: &[&str]) -> Result<()> {
        print_pretty(&plan_document(steps, exports))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_outputs(&self, outputs: &BTreeMap<String, String>) -> Result<()> {
        print_pretty(&serde_json::json!({ "outputs": outputs }))
    }

    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn render_config(&self, config: &DeployConfig, path: &Path) -> Result<()> {
        print_pretty(&serde_json::json!({
            "path": path.display().to_string(),
            "config": config,
        }))
    }
}

fn plan_document(steps: &[PlannedNode], exports: &[&str]) -> serde_json::Value {
    let nodes: Vec<serde_json::Value> = steps
        .iter()
        .map(|s| {
            serde_json::json!({
                "name": s.name,
                "kind": s.kind.as_str(),
                "after": s.after,
            })
        })
        .collect();
    serde_json::json!({ "nodes": nodes, "exports": exports })
}

fn print_pretty(value: &serde_json::Value) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{text}");
    Ok(())
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails (should not happen in
/// practice: `serde_json` only fails on non-finite floats and maps with
/// non-string keys, neither of which appear here).
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}

/// Machine-readable code for a command error.
#[must_use]
pub fn error_code(err: &anyhow::Error) -> &'static str {
    if let Some(failure) = err.downcast_ref::<Failure>() {
        return failure.cause().code();
    }
    if let Some(deploy) = err.downcast_ref::<DeployError>() {
        return deploy.code();
    }
    if err.downcast_ref::<ConfigError>().is_some() {
        return "invalid_config";
    }
    "error"
}
