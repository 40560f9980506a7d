//! `stratus up`: provision the stack and activate the service.

use std::process::ExitCode;

use anyhow::Result;

use crate::app::AppContext;
use crate::application::services::stack;
use crate::commands::Adapters;
use crate::infra::digitalocean::DigitalOcean;
use crate::infra::keys::FsKeySource;
use crate::output::TerminalReporter;

/// Run the up command.
///
/// # Errors
///
/// Returns the originating failure of the run, or a configuration error.
pub async fn run(app: &AppContext) -> Result<ExitCode> {
    let config = app.load_config()?;
    let adapters = Adapters::new(&config, DigitalOcean::from_env(&config.provider)?)?;
    let reporter = TerminalReporter::new(&app.output);

    let provisioning = stack::provision(
        &adapters.provider,
        &adapters.shell,
        &adapters.probe,
        &FsKeySource,
        &config,
        &reporter,
    );
    // Already-created resources stay; a re-run picks them up again.
    let outputs = tokio::select! {
        result = provisioning => result?,
        _ = tokio::signal::ctrl_c() => anyhow::bail!("interrupted; run 'stratus up' again to resume"),
    };

    app.renderer().render_outputs(&outputs)?;
    Ok(ExitCode::SUCCESS)
}
