//! Layered configuration: defaults, then config file, then flags/env.

use anyhow::{Context, Result};
use config_loader::{split_commands, AgentConfig, ConfigLoader};
use tracing::debug;

use crate::cli::Cli;

/// Build the final configuration for this run
///
/// # Errors
/// Unreadable or invalid config file, invalid values, or no command to run
pub fn build_config(cli: &Cli) -> Result<AgentConfig> {
    let mut config = match &cli.config {
        Some(path) => ConfigLoader::load_from_path(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => AgentConfig::default(),
    };

    apply_overrides(&mut config, cli);

    if !cli.commands.is_empty() {
        config.commands = split_commands(
            cli.commands.iter().cloned(),
            config.supervision.nosplit,
            config.supervision.prefix.as_deref(),
        );
    } else if let Some(prefix) = &config.supervision.prefix {
        // Commands from the file inherit the global prefix unless they set one
        for command in config.commands.iter_mut().filter(|c| c.prefix.is_none()) {
            command.prefix = Some(prefix.clone()).filter(|p| !p.is_empty());
        }
    }

    let config = ConfigLoader::finalize(config).context("Invalid configuration")?;
    debug!(commands = config.commands.len(), "Configuration resolved");
    Ok(config)
}

/// Flags only override what they were explicitly given
fn apply_overrides(config: &mut AgentConfig, cli: &Cli) {
    let endpoint = &mut config.endpoint;
    if let Some(url) = &cli.endpoint {
        endpoint.url = url.clone();
    }
    override_opt(&mut endpoint.user, &cli.user);
    override_opt(&mut endpoint.password, &cli.password);
    override_opt(&mut endpoint.host, &cli.host);
    override_opt(&mut endpoint.dbname, &cli.dbname);
    endpoint.ssl |= cli.ssl;
    endpoint.insecure |= cli.insecure;
    if let Some(timeout) = cli.timeout {
        endpoint.timeout = timeout;
    }

    if let Some(capacity) = cli.nbatch {
        config.batch.capacity = capacity;
    }
    if let Some(interval) = cli.batch_time {
        config.batch.interval = interval;
    }

    if let Some(count) = cli.workers {
        config.workers.count = count;
    }
    if let Some(depth) = cli.queue_depth {
        config.workers.queue_depth = depth;
    }

    config.output.verbose |= cli.verbose;
    config.output.debug |= cli.debug;

    config.supervision.fatal |= cli.fatal;
    config.supervision.nosplit |= cli.nosplit;
    override_opt(&mut config.supervision.prefix, &cli.prefix);
}

fn override_opt(target: &mut Option<String>, value: &Option<String>) {
    if value.is_some() {
        target.clone_from(value);
    }
}
