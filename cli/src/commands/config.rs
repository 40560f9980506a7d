//! `stratus config`: show the effective configuration and its location.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration, including defaults
    Show,
    /// Print the config file location
    Path,
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the config file exists but cannot be parsed.
pub fn run(app: &AppContext, cmd: &ConfigCommand) -> Result<ExitCode> {
    let path = app.config_store.path()?;
    match cmd {
        ConfigCommand::Show => {
            let config = app.config_store.load()?;
            app.renderer().render_config(&config, &path)?;
        }
        ConfigCommand::Path => println!("{}", path.display()),
    }
    Ok(ExitCode::SUCCESS)
}
