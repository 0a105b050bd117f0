//! TableWatch - in-memory CSV table with a background file watcher
//!
//! A comma-delimited file is parsed into a [`RecordSet`] owned by a
//! [`StoreManager`] actor. While the file is loaded, a [`FileWatcher`] polls its
//! modification time and swaps in a freshly parsed copy whenever it changes,
//! so readers always see either the old rows or the new rows, never a mix.
//!
//! # Modules
//!
//! - [`record`] - Row and RecordSet types
//! - [`parser`] - Line-oriented reading and writing of delimited text
//! - [`store`] - StoreManager actor (load, unload, snapshot, save)
//! - [`watcher`] - Polling watcher bound to one loaded dataset
//! - [`repl`] - Interactive command prompt
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use tablewatch::{StoreManager, WatcherConfig};
//!
//! let store = StoreManager::spawn(WatcherConfig::default());
//! store.load("a.csv").await?;
//! let rows = store.snapshot().await?;
//! store.save("b.csv").await?;
//! store.shutdown().await?;
//! ```

pub mod cli;
pub mod config;
pub mod parser;
pub mod record;
pub mod repl;
pub mod store;
pub mod watcher;

// Re-export commonly used types
pub use config::{Config, ReplConfig};
pub use parser::{DELIMITER, ParseError, parse, parse_file, write_records};
pub use record::{RecordSet, Row};
pub use store::{LoadSummary, SaveSummary, StoreError, StoreEvent, StoreManager, StoreResponse, StoreStatus};
pub use watcher::{FileWatcher, PollOutcome, WatcherConfig};
