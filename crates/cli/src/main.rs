mod cli;
mod convert;
mod stats;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the completion message and JSON output.
    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = flacport_core::config::load_config_or_default(cli.config.as_deref())
        .context("failed to load configuration")?;
    debug!(config = ?cli.config, "configuration loaded");

    match cli.command {
        Commands::Convert(args) => convert::run(args, config.convert).await,
        Commands::Stats(args) => stats::run(args, config.stats),
    }
}
