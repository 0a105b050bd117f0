//! Store manager messages
//!
//! Commands and responses for the actor pattern.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::oneshot;

use crate::parser::ParseError;
use crate::record::RecordSet;
use crate::watcher::FileWatcher;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("A file is already loaded: {}", .0.display())]
    AlreadyLoaded(PathBuf),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("No file is currently loaded")]
    NotLoaded,

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Channel error")]
    ChannelError,
}

/// Response from store operations
pub type StoreResponse<T> = Result<T, StoreError>;

/// Result of a successful load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub path: PathBuf,
    pub rows: usize,
    /// False when the file's modification time could not be read, so changes
    /// on disk will not be picked up
    pub watching: bool,
}

/// Result of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveSummary {
    pub path: PathBuf,
    pub rows: usize,
}

/// Point-in-time description of a loaded store
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub path: PathBuf,
    pub rows: usize,
    pub generation: u64,
    pub watching: bool,
    pub loaded_at: DateTime<Utc>,
    pub reloaded_at: Option<DateTime<Utc>>,
    pub reloads: u64,
}

/// Event broadcast when the watcher changes (or fails to change) the dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// The backing file changed and the new contents were installed
    Reloaded { path: PathBuf, rows: usize },
    /// The backing file changed but could not be parsed; old data kept
    ReloadFailed { path: PathBuf, error: String },
}

/// Commands sent to the StoreManager actor
#[derive(Debug)]
pub enum StoreCommand {
    /// Install a freshly parsed dataset into an empty store, starting its
    /// watcher when a baseline modification time is known
    Install {
        path: PathBuf,
        records: RecordSet,
        baseline: Option<SystemTime>,
        reply: oneshot::Sender<StoreResponse<(u64, bool)>>,
    },
    /// Move to Empty, returning the watcher that still needs stopping
    Detach {
        reply: oneshot::Sender<StoreResponse<(PathBuf, Option<FileWatcher>)>>,
    },
    Snapshot {
        reply: oneshot::Sender<StoreResponse<Arc<RecordSet>>>,
    },
    /// Swap in a reloaded dataset if `generation` is still current
    Replace {
        generation: u64,
        records: RecordSet,
        reply: oneshot::Sender<bool>,
    },
    Status {
        reply: oneshot::Sender<Option<StoreStatus>>,
    },

    // Shutdown
    Shutdown,
}
