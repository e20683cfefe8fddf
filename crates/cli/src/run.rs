//! Agent wiring: sinks, router, submitter, supervisors.

use anyhow::{Context, Result};
use config_loader::{resolve_endpoint, AgentConfig, ConfigLoader};
use dispatcher::{BatchSink, PassthroughSink, Router, SinkHandle};
use submitter::{build_client, redact_endpoint, Submitter, SubmitterConfig, SubmitterHandle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Lines that may wait in front of each sink; keeps sinks close to lock-step
const SINK_QUEUE_CAPACITY: usize = 1;

/// Run the agent until every child is done, a fatal failure, or a signal
pub async fn run_agent(config: AgentConfig) -> Result<()> {
    let endpoint = if config.endpoint.is_configured() {
        Some(resolve_endpoint(&config.endpoint).context("Invalid InfluxDB endpoint")?)
    } else {
        warn!("No InfluxDB endpoint configured, printing lines to stdout only");
        None
    };

    let submitter = match endpoint {
        Some(endpoint) => {
            let client = build_client(config.endpoint.insecure, config.endpoint.timeout)
                .context("Invalid HTTP client configuration")?;
            Some(Submitter::spawn(
                SubmitterConfig {
                    workers: config.workers.count,
                    queue_depth: config.workers.queue_depth,
                    endpoint,
                    debug: config.output.debug,
                },
                client,
            ))
        }
        None => None,
    };

    let router = build_router(&config, submitter.clone())?;
    let policy = config.supervision.restart_policy();

    info!(
        commands = config.commands.len(),
        sinks = router.sink_count(),
        fatal = policy.is_fatal(),
        "influxin running"
    );

    let shutdown = CancellationToken::new();
    let signals = tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            warn!("Received shutdown signal, stopping...");
            shutdown.cancel();
        }
    });

    // Returns only once every supervisor has released its router clone
    let result = supervisor::run_all_until(config.commands, router.clone(), policy, shutdown)
        .await
        .context("Terminating all on subprocess failure");
    signals.abort();

    // Best effort: hand buffered lines to the submitter before exiting
    for (sink, report) in router.shutdown().await {
        report.publish(&sink);
        info!(sink = %sink, %report, "Sink stopped");
        eprintln!("{sink}: {report}");
    }
    if let Some(submitter) = submitter {
        info!(queued = submitter.queued(), "Submitter stopping");
        eprintln!("{}", submitter.stats());
    }

    result
}

fn build_router(config: &AgentConfig, submitter: Option<SubmitterHandle>) -> Result<Router> {
    let mut handles = Vec::new();

    if let Some(submitter) = submitter {
        let sink = BatchSink::new(
            "influxdb",
            config.batch.capacity,
            config.batch.interval,
            submitter,
        );
        handles.push(SinkHandle::spawn(sink, SINK_QUEUE_CAPACITY));
    }

    // Passthrough is forced on when nothing is shipped anywhere
    if config.output.verbose || handles.is_empty() {
        handles.push(SinkHandle::spawn(PassthroughSink::stdout(), SINK_QUEUE_CAPACITY));
    }

    Router::new(handles).context("Failed to build sink router")
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
pub fn print_config_summary(config: &AgentConfig) -> Result<()> {
    println!("\n=== Configuration Summary ===\n");
    if config.endpoint.is_configured() {
        let endpoint = resolve_endpoint(&config.endpoint).context("Invalid InfluxDB endpoint")?;
        println!("Endpoint: {}", redact_endpoint(&endpoint));
    } else {
        println!("Endpoint: (none, stdout only)");
    }
    println!(
        "Batching: {} lines / {}",
        config.batch.capacity,
        humantime::format_duration(config.batch.interval)
    );
    println!(
        "Workers:  {} (queue depth {})",
        config.workers.count, config.workers.queue_depth
    );
    println!("Fatal:    {}", config.supervision.fatal);

    println!("\nCommands ({}):", config.commands.len());
    for (id, command) in config.commands.iter().enumerate() {
        match &command.prefix {
            Some(prefix) => println!("  #{id}: {command} (prefix {prefix:?})"),
            None => println!("  #{id}: {command}"),
        }
    }

    println!("\n=== Resolved TOML ===\n");
    println!("{}", ConfigLoader::to_toml(config)?);
    Ok(())
}
