//! `stratus plan`: declare the stack without running it.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::stack;
use crate::commands::Adapters;
use crate::infra::digitalocean::DigitalOcean;
use crate::infra::keys::FsKeySource;

/// Arguments for the plan command.
#[derive(Args)]
pub struct PlanArgs {
    /// Print the dependency graph as a Mermaid flowchart
    #[arg(long)]
    pub mermaid: bool,
}

/// Run the plan command.
///
/// # Errors
///
/// Returns an error if the config is incomplete, the private key cannot be
/// read, or the stack cannot be declared.
pub fn run(app: &AppContext, args: &PlanArgs) -> Result<ExitCode> {
    let config = app.load_config()?;
    // Declaring never calls the provider, so no API token is needed.
    let adapters = Adapters::new(&config, DigitalOcean::new("", &config.provider)?)?;
    let plan = stack::declare_stack(
        &adapters.provider,
        &adapters.shell,
        &adapters.probe,
        &FsKeySource,
        &config,
    )?;

    if args.mermaid {
        print!("{plan}");
        return Ok(ExitCode::SUCCESS);
    }
    let exports: Vec<&str> = plan.exports().names().collect();
    app.renderer().render_plan(&plan.steps(), &exports)?;
    Ok(ExitCode::SUCCESS)
}
