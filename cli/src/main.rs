//! Stratus CLI: provision a droplet behind a TLS load balancer

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use stratus_cli::cli::Cli;
use stratus_cli::output::json;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_level());

    let as_json = cli.json;
    match cli.run().await {
        Ok(code) => code,
        Err(e) => {
            if as_json {
                if let Ok(text) = json::format_error(&format!("{e:#}"), json::error_code(&e)) {
                    println!("{text}");
                }
            } else {
                eprintln!("Error: {e:#}");
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(fallback: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
