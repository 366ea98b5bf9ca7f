//! CLI entrypoint for toolwire
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

mod args;
mod call;
mod serve;

use anyhow::{Result, anyhow, bail};
use args::{Cli, Command};
use clap::Parser;
use std::sync::Arc;
use toolwire_application::{ExchangeLogger, NoExchangeLogger};
use toolwire_infrastructure::{ConfigLoader, FileConfig, JsonlExchangeLogger};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity level
    let filter = match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"), // -vvv or more
    };

    // stdout is reserved for command output
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if cli.show_config {
        ConfigLoader::print_config_sources(cli.config.as_deref());
        return Ok(());
    }

    let mut config = if cli.no_config {
        FileConfig::default()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Failed to load configuration: {}", e))?
    };

    let Some(command) = cli.command else {
        bail!("A subcommand is required. Run `toolwire --help` for usage.");
    };

    // Command-line flags take precedence over every config source
    match &command {
        Command::Serve {
            listen,
            allow_origin,
            allow_any_origin,
        } => {
            if let Some(listen) = listen {
                config.server.listen = listen.clone();
            }
            config.server.allowed_origins.extend(allow_origin.iter().cloned());
            config.server.allow_any_origin |= *allow_any_origin;
        }
        Command::Call {
            executor,
            executor_args,
            working_dir,
            ..
        } => {
            if let Some(executor) = executor {
                config.executor.command = Some(executor.clone());
                config.executor.args = executor_args.clone();
            } else if !executor_args.is_empty() {
                config.executor.args = executor_args.clone();
            }
            if let Some(dir) = working_dir {
                config.executor.working_dir = Some(dir.clone());
            }
        }
    }

    config.validate()?;

    let logger: Arc<dyn ExchangeLogger> = match &config.logging.exchange_log {
        Some(path) => match JsonlExchangeLogger::open(path) {
            Some(logger) => {
                info!("Exchange log: {}", logger.path().display());
                Arc::new(logger)
            }
            None => {
                warn!("Continuing without exchange log");
                Arc::new(NoExchangeLogger)
            }
        },
        None => Arc::new(NoExchangeLogger),
    };

    info!("Starting toolwire");

    match command {
        Command::Serve { .. } => serve::run(&config, logger).await,
        Command::Call { tool, args, id, .. } => call::run(&config, &tool, &args, id, logger).await,
    }
}
