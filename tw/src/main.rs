//! TableWatch - in-memory CSV table
//!
//! CLI entry point for the interactive prompt.

use std::fs;
use std::path::PathBuf;

use clap::Parser;
use eyre::{Context, Result};
use tracing::info;

use tablewatch::cli::Cli;
use tablewatch::config::Config;
use tablewatch::repl;

/// Where `tw` keeps its log. Stdout belongs to the prompt, so tracing output
/// never goes there.
fn log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tablewatch")
        .join("logs")
        .join("tablewatch.log")
}

fn setup_logging(verbose: bool) -> Result<PathBuf> {
    let path = log_path();
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| format!("Cannot create log directory {}", dir.display()))?;
    }
    let file = fs::File::create(&path).with_context(|| format!("Cannot open log file {}", path.display()))?;

    // RUST_LOG narrows or widens individual targets; -v raises the floor
    let floor = if verbose { tracing::Level::DEBUG } else { tracing::Level::INFO };
    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(floor.into());

    tracing_subscriber::fmt()
        .with_writer(file)
        .with_ansi(false)
        .with_env_filter(filter)
        .init();

    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log = setup_logging(cli.verbose)?;
    info!(log = %log.display(), verbose = cli.verbose, "tw starting");

    let mut config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    if let Some(interval_ms) = cli.poll_interval_ms {
        config.watch.poll_interval_ms = interval_ms;
    }

    info!(
        poll_interval_ms = config.watch.poll_interval_ms,
        confirm_load = config.repl.confirm_load,
        confirm_save = config.repl.confirm_save,
        "Effective configuration"
    );

    repl::run_interactive(&config, cli.file).await
}
