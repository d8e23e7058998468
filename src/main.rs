//! Real Estate Investment Advisor - Main Entry Point
//!
//! Loads the configured models and reference dataset, then runs one
//! command: status, single-property prediction, batch scoring or insights.

use anyhow::Result;
use clap::Parser;
use real_estate_advisor::cli::{self, Cli};
use real_estate_advisor::config::{AppConfig, LoggingConfig};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingConfig, verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("real_estate_advisor={}", level).parse()?);

    match logging.format.as_str() {
        "json" => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .init(),
        _ => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    init_logging(&config.logging, cli.verbose)?;

    info!(
        classifier = %config.paths.classifier.display(),
        regressor = %config.paths.regressor.display(),
        reference_data = %config.paths.reference_data.display(),
        "Configuration loaded"
    );

    cli::run(cli, config)
}
