//! Terminal and JSON output.

pub mod human;
pub mod json;
pub mod progress;
pub mod reporter;
pub mod styles;

use console::Term;
use owo_colors::{OwoColorize as _, Style};
pub use human::HumanRenderer;
pub use json::JsonRenderer;
pub use reporter::TerminalReporter;
pub use styles::Styles;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::Result;

use crate::domain::DeployConfig;
use crate::engine::PlannedNode;

/// Styling and terminal state shared by every renderer.
pub struct OutputContext {
    pub styles: Styles,
    /// Whether stdout is a TTY.
    pub is_tty: bool,
    /// Suppress everything except errors.
    pub quiet: bool,
}

impl OutputContext {
    /// Colors are on only for a TTY without `--no-color` or `NO_COLOR`.
    #[must_use]
    pub fn new(no_color: bool, quiet: bool) -> Self {
        let is_tty = Term::stdout().is_term();
        let mut styles = Styles::default();
        if is_tty && !no_color && std::env::var_os("NO_COLOR").is_none() {
            styles.colorize();
        }
        Self {
            styles,
            is_tty,
            quiet,
        }
    }

    /// Spinners only make sense on an interactive, non-quiet terminal.
    #[must_use]
    pub fn show_progress(&self) -> bool {
        self.is_tty && !self.quiet
    }

    /// `  → msg`
    pub fn step(&self, msg: &str) {
        self.line("→", self.styles.step, msg);
    }

    /// `  ✓ msg`
    pub fn success(&self, msg: &str) {
        self.line("✓", self.styles.success, msg);
    }

    /// `  ! msg`
    pub fn warn(&self, msg: &str) {
        self.line("!", self.styles.warning, msg);
    }

    pub fn header(&self, msg: &str) {
        if !self.quiet {
            println!("  {}", msg.style(self.styles.header));
        }
    }

    /// Key dimmed, value plain.
    pub fn kv(&self, key: &str, value: &str) {
        if !self.quiet {
            println!("  {}  {value}", key.style(self.styles.dim));
        }
    }

    fn line(&self, marker: &str, style: Style, msg: &str) {
        if !self.quiet {
            println!("  {} {msg}", marker.style(style));
        }
    }
}

/// Dispatches rendering to the human or JSON renderer.
pub enum Renderer<'a> {
    Human(HumanRenderer<'a>),
    Json(JsonRenderer),
}

impl Renderer<'_> {
    pub fn render_version(&self, version: &str) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_version(version);
                Ok(())
            }
            Self::Json(r) => r.render_version(version),
        }
    }

    pub fn render_plan(&self, steps: &[PlannedNode], exports: &[&str]) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_plan(steps, exports);
                Ok(())
            }
            Self::Json(r) => r.render_plan(steps, exports),
        }
    }

    pub fn render_outputs(&self, outputs: &BTreeMap<String, String>) -> Result<()> {
        match self {
            Self::Human(r) => {
                r.render_outputs(outputs);
                Ok(())
            }
            Self::Json(r) => r.render_outputs(outputs),
        }
    }

    pub fn render_config(&self, config: &DeployConfig, path: &Path) -> Result<()> {
        match self {
            Self::Human(r) => r.render_config(config, path),
            Self::Json(r) => r.render_config(config, path),
        }
    }
}
