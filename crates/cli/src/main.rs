//! # influxin
//!
//! Command-line entry point.
//!
//! Provides:
//! - Layered configuration (file, env, flags)
//! - Pipeline wiring and lifecycle
//! - Graceful shutdown handling

mod cli;
mod run;
mod settings;

use anyhow::Result;
use clap::Parser;
use observability::ObservabilityConfig;
use tracing::{debug, error};

use cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = settings::build_config(&cli);

    let debug = cli.debug || config.as_ref().is_ok_and(|c| c.output.debug);
    init_logging(&cli, debug)?;

    debug!(version = env!("CARGO_PKG_VERSION"), "influxin starting");

    let result = match config {
        Ok(config) if cli.dry_run => run::print_config_summary(&config),
        Ok(config) => run::run_agent(config).await,
        Err(e) => Err(e),
    };

    if let Err(ref e) = result {
        error!(error = format!("{e:#}"), "Fatal");
    }

    result
}

/// Initialize logging based on CLI options
fn init_logging(cli: &Cli, debug: bool) -> Result<()> {
    observability::init_with_config(ObservabilityConfig {
        log_format: cli.log_format.into(),
        metrics_port: (cli.metrics_port != 0).then_some(cli.metrics_port),
        default_log_level: if debug { "debug" } else { "info" }.to_string(),
    })
}
