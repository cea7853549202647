#![forbid(unsafe_code)]
//! vecstore operator CLI.
//!
//! Runs a single store command against the engine configured through
//! `VECSTORE_*` environment variables. Results go to stdout as JSON, logs go
//! to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use vecstore_client::HttpEngine;
use vecstore_core::VectorStore;

mod commands;
mod config;
mod env_utils;

use crate::commands::Cli;
use crate::config::CliConfig;

fn main() -> Result<()> {
    let Cli { command } = Cli::parse();
    init_tracing();

    let config = CliConfig::from_env().context("invalid configuration")?;

    let engine = HttpEngine::with_options(&config.url, config.bulk_port, config.client_options())
        .with_context(|| format!("invalid engine URL '{}'", config.url))?;
    tracing::debug!(
        url = %config.url,
        bulk_port = config.bulk_port,
        dimensions = config.dimensions,
        batch_max_size = config.batch_max_size,
        ?command,
        "running command"
    );

    let output = VectorStore::scoped(engine, config.store_config(), |store| {
        commands::run(store, &command)
    })?;

    let rendered = serde_json::to_string_pretty(&output).context("failed to render output")?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(error) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
    {
        eprintln!("failed to initialize tracing subscriber: {error}");
    }
}
