//! State shared by every command handler: output settings and the config
//! location resolved from the global flags.

use std::path::PathBuf;

use anyhow::Result;

use crate::application::ports::ConfigStore;
use crate::domain::DeployConfig;
use crate::infra::config::YamlConfigStore;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

/// `--no-color`, `--quiet` and `--json`.
pub struct OutputFlags {
    pub no_color: bool,
    pub quiet: bool,
    pub json: bool,
}

/// Global flags handed over by [`crate::cli::Cli`].
pub struct AppFlags {
    pub output: OutputFlags,
    /// `--config`, already merged with `STRATUS_CONFIG` by clap.
    pub config: Option<PathBuf>,
}

pub struct AppContext {
    pub output: OutputContext,
    pub mode: OutputMode,
    pub config_store: YamlConfigStore,
}

impl AppContext {
    #[must_use]
    pub fn new(flags: AppFlags) -> Self {
        let AppFlags { output, config } = flags;
        let mode = if output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        // Progress lines would corrupt the JSON document on stdout.
        let quiet = output.quiet || mode == OutputMode::Json;
        let config_store = match config {
            Some(path) => YamlConfigStore::at(path),
            None => YamlConfigStore::default(),
        };

        Self {
            output: OutputContext::new(output.no_color, quiet),
            mode,
            config_store,
        }
    }

    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Load the configuration and check it is complete.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or a required setting
    /// is missing.
    pub fn load_config(&self) -> Result<DeployConfig> {
        let config = self.config_store.load()?;
        config.validate()?;
        Ok(config)
    }
}
