//! CLI argument parsing for tw

use clap::Parser;
use std::path::PathBuf;

/// TableWatch - in-memory CSV table that follows its file on disk
#[derive(Parser, Debug)]
#[command(
    name = "tw",
    author,
    version,
    about = "In-memory CSV table that reloads itself when the file changes",
    after_help = "Logs are written to: ~/.local/share/tablewatch/logs/tablewatch.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    /// Override the watcher polling interval
    #[arg(short = 'i', long, value_name = "MS")]
    pub poll_interval_ms: Option<u64>,

    /// CSV file to load on startup (no confirmation prompt)
    pub file: Option<PathBuf>,
}
