//! Decoy service listener.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                 DECOY LISTENER                    │
//!   Connection       │  ┌──────────┐   spawn    ┌──────────────┐         │
//!   ─────────────────┼─▶│   net    │──────────▶│   session    │─────────┼──▶ static reply, close
//!                    │  │ listener │            └──────┬───────┘         │
//!                    │  └──────────┘                   │ offender ip     │
//!                    │                                 ▼                 │
//!                    │                         ┌──────────────┐          │
//!                    │                         │  dispatcher  │ cooldown │
//!                    │                         └──────┬───────┘          │
//!                    │                                │ once per window  │
//!                    │                                ▼                  │
//!                    │                         ┌──────────────┐          │
//!                    │                         │   handlers   │──────────┼──▶ processes / webhooks
//!                    │                         └──────────────┘          │
//!                    └──────────────────────────────────────────────────┘
//! ```
//!
//! Exit status 2 means the configuration could not be resolved or the port
//! could not be bound. Otherwise the process runs until terminated.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use decoy_honeypot::config::{load_config, LogFormat, DEFAULT_CONFIG_PATH};
use decoy_honeypot::lifecycle::{termination_signal, Shutdown};
use decoy_honeypot::observability::{logging, metrics};
use decoy_honeypot::{critical, Acceptor, Dispatcher, FATAL_EXIT_CODE};

#[derive(Parser, Debug)]
#[command(name = "decoy-honeypot", version, about = "Decoy TCP listener with throttled alerting")]
struct Cli {
    /// Config file (JSON, or TOML when the name ends in .toml)
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logging depends on the resolved format, so resolve first and report after.
    let resolved = load_config(&cli.config);
    let format = resolved
        .as_ref()
        .map(|config| config.log_format)
        .unwrap_or(LogFormat::Text);
    logging::init(format);

    let config = match resolved {
        Ok(config) => config,
        Err(e) => {
            critical!("problem resolving configuration: {}", e);
            return ExitCode::from(FATAL_EXIT_CODE);
        }
    };

    if !cli.config.exists() {
        tracing::warn!(
            path = %cli.config.display(),
            "Config file not found, using environment and defaults"
        );
    }

    tracing::info!(
        port = config.port,
        interface = %config.interface,
        cooldown_secs = config.cooldown.as_secs(),
        handlers = ?config.handlers,
        read_limit = config.read_limit,
        "Configuration loaded"
    );

    let dispatcher = match Dispatcher::from_config(&config) {
        Ok(dispatcher) => Arc::new(dispatcher),
        Err(e) => {
            critical!("problem setting up handlers: {}", e);
            return ExitCode::from(FATAL_EXIT_CODE);
        }
    };

    let acceptor = match Acceptor::bind(&config).await {
        Ok(acceptor) => acceptor,
        Err(e) => {
            critical!("bind failed: {}", e);
            return ExitCode::from(FATAL_EXIT_CODE);
        }
    };

    if let Some(addr) = config.metrics_address {
        if let Err(e) = metrics::init_exporter(addr) {
            tracing::error!(metrics_address = %addr, error = %e, "Failed to start metrics exporter");
        }
    }

    let shutdown = Shutdown::new();
    let accept_loop = tokio::spawn(acceptor.run(dispatcher, shutdown.subscribe()));

    termination_signal().await;
    shutdown.trigger();
    if let Err(e) = accept_loop.await {
        tracing::error!(error = %e, "Accept loop ended abnormally");
    }

    tracing::info!("Shutdown complete");
    ExitCode::SUCCESS
}
