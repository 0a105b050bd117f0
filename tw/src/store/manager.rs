//! StoreManager - actor that owns the loaded table
//!
//! All state transitions go through one command channel. The actor never
//! parses, never touches the filesystem and never waits on the watcher, so a
//! slow reload cannot hold up a snapshot.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::parser::{ParseError, parse_file};
use crate::record::RecordSet;
use crate::watcher::{FileWatcher, WatcherConfig};

use super::messages::{LoadSummary, SaveSummary, StoreCommand, StoreError, StoreEvent, StoreResponse, StoreStatus};
use super::persistence::write_atomic;

/// Handle to send commands to the store actor
#[derive(Clone)]
pub struct StoreManager {
    tx: mpsc::Sender<StoreCommand>,
    /// Broadcast sender for watcher notifications
    event_tx: broadcast::Sender<StoreEvent>,
}

impl StoreManager {
    /// Spawn a new, empty store actor
    pub fn spawn(watcher_config: WatcherConfig) -> Self {
        debug!(interval_ms = watcher_config.poll_interval_ms, "spawn: called");
        let (tx, rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);

        let handle = SelfHandle {
            tx: tx.downgrade(),
            event_tx: event_tx.clone(),
            watcher_config,
        };
        tokio::spawn(actor_loop(rx, handle));

        info!("StoreManager spawned");
        Self { tx, event_tx }
    }

    /// Subscribe to reload notifications from the watcher
    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.event_tx.subscribe()
    }

    /// Load a file into the empty store and start watching it
    pub async fn load(&self, path: impl AsRef<Path>) -> StoreResponse<LoadSummary> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "load: called");

        if let Some(status) = self.status().await? {
            return Err(StoreError::AlreadyLoaded(status.path));
        }

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StoreError::NotFound(path)),
            Err(source) => {
                return Err(StoreError::Load {
                    path: path.clone(),
                    source: ParseError::Open { path, source },
                });
            }
        };
        // Taken before parsing so an edit made while parsing still counts as new
        let baseline = match metadata.modified() {
            Ok(modified) => Some(modified),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Cannot read modification time; file will not be watched");
                None
            }
        };

        let parse_path = path.clone();
        let records = tokio::task::spawn_blocking(move || parse_file(&parse_path))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
            .map_err(|source| StoreError::Load {
                path: path.clone(),
                source,
            })?;
        let rows = records.len();

        // The watcher is started inside the same actor step that installs
        // the dataset, so a concurrent unload always gets it back to stop
        let (generation, watching) = self
            .request(|reply| StoreCommand::Install {
                path: path.clone(),
                records,
                baseline,
                reply,
            })
            .await??;

        info!(path = %path.display(), rows, generation, watching, "Loaded file");
        Ok(LoadSummary { path, rows, watching })
    }

    /// Empty the store, waiting for its watcher to exit before returning
    pub async fn unload(&self) -> StoreResponse<PathBuf> {
        debug!("unload: called");
        let (path, watcher) = self.request(|reply| StoreCommand::Detach { reply }).await??;

        if let Some(mut watcher) = watcher {
            debug!(path = %watcher.path().display(), generation = watcher.generation(), "unload: stopping watcher");
            watcher.stop().await;
        }

        info!(path = %path.display(), "Unloaded file");
        Ok(path)
    }

    /// Current rows as an immutable, shared view
    pub async fn snapshot(&self) -> StoreResponse<Arc<RecordSet>> {
        debug!("snapshot: called");
        self.request(|reply| StoreCommand::Snapshot { reply }).await?
    }

    /// Write the current rows to `path`
    pub async fn save(&self, path: impl AsRef<Path>) -> StoreResponse<SaveSummary> {
        let path = path.as_ref().to_path_buf();
        debug!(path = %path.display(), "save: called");

        let records = self.snapshot().await?;
        let rows = records.len();

        let write_path = path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&write_path, &records))
            .await
            .map_err(|e| StoreError::TaskFailed(e.to_string()))?
            .map_err(|source| StoreError::Write {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), rows, "Saved file");
        Ok(SaveSummary { path, rows })
    }

    /// Describe the loaded dataset, or None when empty
    pub async fn status(&self) -> StoreResponse<Option<StoreStatus>> {
        debug!("status: called");
        self.request(|reply| StoreCommand::Status { reply }).await
    }

    /// Unload (if needed) and stop the actor
    pub async fn shutdown(&self) -> StoreResponse<()> {
        debug!("shutdown: called");
        match self.unload().await {
            Ok(_) | Err(StoreError::NotLoaded) => {}
            Err(e) => return Err(e),
        }
        self.tx
            .send(StoreCommand::Shutdown)
            .await
            .map_err(|_| StoreError::ChannelError)
    }

    /// Install a reloaded dataset. Returns false when `generation` is no
    /// longer the loaded one.
    pub(crate) async fn replace(&self, generation: u64, records: RecordSet) -> StoreResponse<bool> {
        debug!(generation, rows = records.len(), "replace: called");
        self.request(|reply| StoreCommand::Replace {
            generation,
            records,
            reply,
        })
        .await
    }

    pub(crate) fn notify(&self, event: StoreEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    async fn request<T>(&self, command: impl FnOnce(oneshot::Sender<T>) -> StoreCommand) -> StoreResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(command(reply_tx))
            .await
            .map_err(|_| StoreError::ChannelError)?;
        reply_rx.await.map_err(|_| StoreError::ChannelError)
    }
}

/// What the actor needs to hand a new watcher its own StoreManager
///
/// Holds a weak sender so the actor still ends once every external handle
/// (and every watcher) has been dropped.
struct SelfHandle {
    tx: mpsc::WeakSender<StoreCommand>,
    event_tx: broadcast::Sender<StoreEvent>,
    watcher_config: WatcherConfig,
}

impl SelfHandle {
    fn upgrade(&self) -> Option<StoreManager> {
        self.tx.upgrade().map(|tx| StoreManager {
            tx,
            event_tx: self.event_tx.clone(),
        })
    }

    /// Create and start the watcher for a freshly installed dataset
    fn start_watcher(&self, path: &Path, generation: u64, baseline: SystemTime) -> Option<FileWatcher> {
        let Some(store) = self.upgrade() else {
            warn!(path = %path.display(), "Store is shutting down; file will not be watched");
            return None;
        };
        let mut watcher = FileWatcher::new(path.to_path_buf(), generation, self.watcher_config.clone());
        watcher.start(store, baseline);
        Some(watcher)
    }
}

/// State of a loaded store
struct LoadedTable {
    path: PathBuf,
    generation: u64,
    records: Arc<RecordSet>,
    watcher: Option<FileWatcher>,
    loaded_at: DateTime<Utc>,
    reloaded_at: Option<DateTime<Utc>>,
    reloads: u64,
}

impl LoadedTable {
    fn status(&self) -> StoreStatus {
        StoreStatus {
            path: self.path.clone(),
            rows: self.records.len(),
            generation: self.generation,
            watching: self.watcher.as_ref().is_some_and(FileWatcher::is_running),
            loaded_at: self.loaded_at,
            reloaded_at: self.reloaded_at,
            reloads: self.reloads,
        }
    }
}

/// The actor loop that owns the table
async fn actor_loop(mut rx: mpsc::Receiver<StoreCommand>, handle: SelfHandle) {
    debug!("StoreManager actor started");
    let mut table: Option<LoadedTable> = None;
    let mut next_generation: u64 = 1;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StoreCommand::Install {
                path,
                records,
                baseline,
                reply,
            } => {
                debug!(path = %path.display(), rows = records.len(), "actor_loop: Install command");
                let result = match &table {
                    Some(loaded) => Err(StoreError::AlreadyLoaded(loaded.path.clone())),
                    None => {
                        let generation = next_generation;
                        next_generation += 1;
                        let watcher =
                            baseline.and_then(|baseline| handle.start_watcher(&path, generation, baseline));
                        let watching = watcher.is_some();
                        table = Some(LoadedTable {
                            path,
                            generation,
                            records: Arc::new(records),
                            watcher,
                            loaded_at: Utc::now(),
                            reloaded_at: None,
                            reloads: 0,
                        });
                        Ok((generation, watching))
                    }
                };
                let _ = reply.send(result);
            }

            StoreCommand::Detach { reply } => {
                debug!("actor_loop: Detach command");
                let result = match table.take() {
                    Some(loaded) => Ok((loaded.path, loaded.watcher)),
                    None => Err(StoreError::NotLoaded),
                };
                let _ = reply.send(result);
            }

            StoreCommand::Snapshot { reply } => {
                let result = table
                    .as_ref()
                    .map(|loaded| Arc::clone(&loaded.records))
                    .ok_or(StoreError::NotLoaded);
                let _ = reply.send(result);
            }

            StoreCommand::Replace {
                generation,
                records,
                reply,
            } => {
                debug!(generation, rows = records.len(), "actor_loop: Replace command");
                let applied = match table.as_mut() {
                    Some(loaded) if loaded.generation == generation => {
                        loaded.records = Arc::new(records);
                        loaded.reloaded_at = Some(Utc::now());
                        loaded.reloads += 1;
                        true
                    }
                    _ => {
                        info!(generation, "Discarding reload for a dataset that is no longer loaded");
                        false
                    }
                };
                let _ = reply.send(applied);
            }

            StoreCommand::Status { reply } => {
                let _ = reply.send(table.as_ref().map(LoadedTable::status));
            }

            StoreCommand::Shutdown => {
                info!("StoreManager shutting down");
                break;
            }
        }
    }

    debug!("StoreManager actor stopped");
}
