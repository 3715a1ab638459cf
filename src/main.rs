//! Product listing HTTP server.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                   PRODUCT API                    │
//!                      │                                                  │
//!   Client Request     │  ┌──────────┐    ┌──────────┐    ┌───────────┐   │
//!   ───────────────────┼─▶│   net    │───▶│   http   │───▶│  catalog  │   │
//!                      │  │ listener │    │  server  │    │  router   │   │
//!   Client Response    │  └──────────┘    └────┬─────┘    └───────────┘   │
//!   ◀──────────────────┼───────────────────────┘                          │
//!                      │         ▲ ShutdownWatch                          │
//!                      │         │                                        │
//!   SIGINT/SIGTERM     │  ┌──────┴──────────────────────────────────┐     │
//!   ───────────────────┼─▶│ lifecycle: signals → coordinator        │     │
//!                      │  │ drain with deadline, then force close   │     │
//!                      │  └─────────────────────────────────────────┘     │
//!                      └──────────────────────────────────────────────────┘
//! ```
//!
//! Exit codes: `0` clean shutdown, `1` startup or listener failure,
//! `2` forced close after the drain deadline.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use product_api::catalog::{self, Catalog};
use product_api::config::{load_config, validation::validate_config, AppConfig, ConfigError};
use product_api::lifecycle::{signals, Coordinator, Outcome};
use product_api::observability::logging;

#[derive(Parser)]
#[command(name = "product-api")]
#[command(about = "Serves the product list over HTTP", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address (e.g. 127.0.0.1:8000).
    #[arg(short, long)]
    bind: Option<String>,
}

fn load(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };

    if let Some(bind) = &cli.bind {
        config.listener.bind_address = bind.clone();
        validate_config(&config).map_err(ConfigError::Validation)?;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("product-api: {e}");
            return ExitCode::from(1);
        }
    };

    if let Err(e) = logging::init(&config.observability) {
        eprintln!("product-api: {e}");
        return ExitCode::from(1);
    }

    tracing::info!("product-api v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        read_ms = config.timeouts.read_ms,
        write_ms = config.timeouts.write_ms,
        shutdown_ms = config.timeouts.shutdown_ms,
        products = config.catalog.products.len(),
        "Configuration loaded"
    );

    let termination = match signals::listen() {
        Ok(rx) => rx,
        Err(e) => {
            tracing::error!(error = %e, "Failed to install signal handlers");
            return ExitCode::from(1);
        }
    };

    let catalog = Catalog::new(config.catalog.products.clone());
    if catalog.is_empty() {
        tracing::warn!("Catalog has no products, listing will be empty");
    }
    let coordinator = Coordinator::new(&config, catalog::router(catalog));
    let outcome = coordinator.run(termination).await;

    match &outcome {
        Outcome::Clean => tracing::info!("Shutdown complete"),
        Outcome::ListenerFailed(error) => {
            tracing::error!(error = %error, "Exiting after listener failure")
        }
        Outcome::ForcedClose { drain, close } => tracing::warn!(
            drain_error = %drain,
            close_error = ?close,
            "Exiting after forced close"
        ),
    }

    ExitCode::from(outcome.exit_code())
}
