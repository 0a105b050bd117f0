//! Watcher module for picking up external edits to the loaded file
//!
//! A FileWatcher polls the backing file's modification time and, when it
//! moves forward, reparses the file and hands the result to the store.

mod config;
mod file_watcher;

pub use config::{DEFAULT_POLL_INTERVAL_MS, WatcherConfig};
pub use file_watcher::{FileWatcher, PollOutcome, PollTask};
