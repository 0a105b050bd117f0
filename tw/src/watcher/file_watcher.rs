//! Polling file watcher implementation

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use eyre::{Result, WrapErr};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::WatcherConfig;
use crate::parser::parse_file;
use crate::store::{StoreEvent, StoreManager};

/// What a single poll did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Modification time has not moved forward
    Unchanged,
    /// File was reparsed and installed into the store
    Reloaded { rows: usize },
    /// File was reparsed but the store had moved on (unloaded or reloaded
    /// from another file), so the result was dropped
    Discarded,
}

/// Watches one loaded file on behalf of a StoreManager
///
/// Stopped until [`start`](Self::start) is called; `start` while running and
/// `stop` while stopped are both no-ops. Dropping a running watcher closes its
/// shutdown channel, which also ends the polling task.
#[derive(Debug)]
pub struct FileWatcher {
    path: PathBuf,
    generation: u64,
    config: WatcherConfig,
    running: Option<RunningWatcher>,
}

#[derive(Debug)]
struct RunningWatcher {
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

impl FileWatcher {
    /// Create a stopped watcher for the dataset `generation` loaded from `path`
    pub fn new(path: PathBuf, generation: u64, config: WatcherConfig) -> Self {
        Self {
            path,
            generation,
            config,
            running: None,
        }
    }

    /// Spawn the polling task. Changes are detected relative to `baseline`.
    ///
    /// Returns false if the watcher was already running.
    pub fn start(&mut self, store: StoreManager, baseline: SystemTime) -> bool {
        debug!(path = %self.path.display(), generation = self.generation, "start: called");
        if self.running.is_some() {
            debug!("start: already running");
            return false;
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let task = PollTask::new(self.path.clone(), self.generation, baseline, store);
        let handle = tokio::spawn(task.run(self.config.poll_interval(), shutdown_rx));
        self.running = Some(RunningWatcher { shutdown_tx, handle });

        info!(
            path = %self.path.display(),
            generation = self.generation,
            interval_ms = self.config.poll_interval_ms,
            "FileWatcher started"
        );
        true
    }

    /// Signal the polling task and wait for it to exit
    ///
    /// A poll already in progress finishes first; none starts afterwards.
    pub async fn stop(&mut self) {
        debug!(path = %self.path.display(), "stop: called");
        let Some(running) = self.running.take() else {
            debug!("stop: not running");
            return;
        };

        // Fails only if the task already exited
        let _ = running.shutdown_tx.send(()).await;
        if let Err(e) = running.handle.await {
            error!(error = %e, "FileWatcher task ended abnormally");
        }
        info!(path = %self.path.display(), generation = self.generation, "FileWatcher stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// The body of the watcher: one file, one dataset generation, one timestamp
pub struct PollTask {
    path: PathBuf,
    generation: u64,
    last_modified: SystemTime,
    store: StoreManager,
}

impl PollTask {
    pub fn new(path: PathBuf, generation: u64, last_modified: SystemTime, store: StoreManager) -> Self {
        Self {
            path,
            generation,
            last_modified,
            store,
        }
    }

    /// Poll every `interval` until the shutdown channel fires or closes
    async fn run(mut self, interval: Duration, mut shutdown_rx: mpsc::Receiver<()>) {
        debug!(path = %self.path.display(), "run: called");

        let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown_rx.recv() => {
                    debug!("Shutdown signal received");
                    break;
                }
                _ = ticker.tick() => {
                    match self.check_once().await {
                        Ok(PollOutcome::Reloaded { rows }) => {
                            debug!(rows, "run: reload applied");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(path = %self.path.display(), error = %e, "Error checking watched file");
                        }
                    }
                }
            }
        }

        debug!(path = %self.path.display(), "FileWatcher task exiting");
    }

    /// Run a single check
    ///
    /// A stat failure leaves the timestamp alone. Once a newer timestamp is
    /// seen it is recorded before reparsing, so a failed or slow reparse does
    /// not trigger again for the same change.
    pub async fn check_once(&mut self) -> Result<PollOutcome> {
        let modified = tokio::fs::metadata(&self.path)
            .await
            .and_then(|metadata| metadata.modified())
            .wrap_err_with(|| format!("Failed to stat {}", self.path.display()))?;

        if modified <= self.last_modified {
            return Ok(PollOutcome::Unchanged);
        }
        self.last_modified = modified;

        info!(path = %self.path.display(), "Detected file change, reloading");

        let path = self.path.clone();
        let parsed = tokio::task::spawn_blocking(move || parse_file(&path))
            .await
            .wrap_err("Reload task failed")?;

        let records = match parsed {
            Ok(records) => records,
            Err(e) => {
                self.store.notify(StoreEvent::ReloadFailed {
                    path: self.path.clone(),
                    error: e.to_string(),
                });
                return Err(e).wrap_err("Failed to reload file");
            }
        };

        let rows = records.len();
        if self.store.replace(self.generation, records).await? {
            info!(path = %self.path.display(), rows, "Reload complete");
            self.store.notify(StoreEvent::Reloaded {
                path: self.path.clone(),
                rows,
            });
            Ok(PollOutcome::Reloaded { rows })
        } else {
            debug!(generation = self.generation, "check_once: dataset no longer current, reload dropped");
            Ok(PollOutcome::Discarded)
        }
    }

    /// Last modification time that has been acted on
    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }
}
