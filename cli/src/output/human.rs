//! Human-readable terminal renderer.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use owo_colors::OwoColorize as _;

use crate::domain::DeployConfig;
use crate::engine::PlannedNode;
use crate::output::OutputContext;

/// Renders domain types as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version.
    pub fn render_version(&self, version: &str) {
        println!("stratus {version}");
    }

    /// Render declared nodes in declaration order, then the export names.
    pub fn render_plan(&self, steps: &[PlannedNode], exports: &[&str]) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.header("Plan:");
        let width = steps.iter().map(|s| s.name.len()).max().unwrap_or(0);
        for step in steps {
            let after = if step.after.is_empty() {
                String::new()
            } else {
                format!("after {}", step.after.join(", "))
            };
            println!(
                "    {:<width$}  {:<8}  {}",
                step.name,
                step.kind.as_str().style(self.ctx.styles.dim),
                after
            );
        }
        println!();
        self.ctx.header("Exports:");
        for name in exports {
            println!("    {name}");
        }
    }

    /// Render the resolved export table.
    pub fn render_outputs(&self, outputs: &BTreeMap<String, String>) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Outputs:");
        let width = outputs.keys().map(String::len).max().unwrap_or(0);
        for (name, value) in outputs {
            let value = value.trim_end();
            if value.contains('\n') {
                println!("    {}", name.style(self.ctx.styles.dim));
                for line in value.lines() {
                    println!("      {line}");
                }
            } else {
                println!("    {:<width$}  {value}", name.style(self.ctx.styles.dim));
            }
        }
    }

    /// Render the effective configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_config(&self, config: &DeployConfig, path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(config).context("cannot serialize config")?;
        self.ctx.kv("Config file:", &path.display().to_string());
        println!();
        print!("{yaml}");
        Ok(())
    }
}
