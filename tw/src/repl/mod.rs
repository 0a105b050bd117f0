//! Interactive REPL for TableWatch
//!
//! Reads commands from the terminal and runs them against a StoreManager,
//! printing watcher notices between prompts.

mod command;
mod session;

pub use command::{ReplCommand, format_notice, format_rows, parse_answer, parse_command};
pub use session::ReplSession;

use std::path::PathBuf;

use eyre::Result;

use crate::config::Config;
use crate::store::StoreManager;

/// Run the interactive REPL
///
/// This is the main entry point for `tw`.
pub async fn run_interactive(config: &Config, initial_file: Option<PathBuf>) -> Result<()> {
    let store = StoreManager::spawn(config.watch.clone());
    let mut session = ReplSession::new(store, config.repl.clone());
    session.run(initial_file).await
}
