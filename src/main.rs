//! MySQL Pulse - gated diagnostic queries for MySQL metric collection
//!
//! This is the main entry point for the `mp` binary.

use anyhow::Result;
use clap::Parser;
use mp_cli::Cli;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.load_config()?;

    // Set up logging based on verbosity, then config
    let default_level = if cli.verbose {
        "debug"
    } else {
        config.global.log_level.as_str()
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let (plain, json) = if config.global.json_logs {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(plain)
        .with(json)
        .with(filter)
        .init();

    // Run the CLI
    cli.run(&config).await?;

    Ok(())
}
