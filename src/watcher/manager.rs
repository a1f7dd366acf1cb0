//! Watch manager: owns every directory watch and serializes all mutations.
//!
//! The manager runs as a single actor task. Client commands and
//! delete events from the directory watches arrive on queues consumed by
//! that one task, so changes to a directory's tracked set happen in a
//! total order and a watch is torn down at most once.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use super::events::DirectoryEvents;
use super::metadata::FileMetadata;
use super::reporter::MetadataReporter;
use super::watch::DirectoryWatch;
use crate::error::WatcherError;
use crate::protocol::{TrackedFile, TrackingResult};
use crate::{Error, Result};

/// Capacity of the command queue.
const REQUEST_QUEUE: usize = 100;

/// Watch manager configuration.
#[derive(Debug, Clone)]
pub struct ManagerConfig {
    /// Debounce duration for file events.
    pub debounce: Duration,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(500),
        }
    }
}

enum Request {
    Start {
        file: TrackedFile,
        reply: oneshot::Sender<TrackingResult>,
    },
    Stop {
        path: PathBuf,
        reply: oneshot::Sender<TrackingResult>,
    },
    List {
        reply: oneshot::Sender<Vec<TrackedFile>>,
    },
    WatchedDirs {
        reply: oneshot::Sender<Vec<PathBuf>>,
    },
    StopAll {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to the watch manager actor.
#[derive(Debug)]
pub struct WatchManager {
    request_tx: mpsc::Sender<Request>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl WatchManager {
    /// Spawn the manager actor.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(config: ManagerConfig, reporter: Arc<dyn MetadataReporter>) -> Self {
        let (request_tx, request_rx) = mpsc::channel(REQUEST_QUEUE);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let actor = ManagerActor {
            dirs: HashMap::new(),
            config,
            reporter,
            events_tx,
        };
        let task = tokio::spawn(actor.run(request_rx, events_rx));

        tracing::debug!("Watch manager started");

        Self {
            request_tx,
            task: Mutex::new(Some(task)),
        }
    }

    async fn call<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> Request) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.request_tx
            .send(make(reply))
            .await
            .map_err(|_| WatcherError::ManagerStopped)?;
        response
            .await
            .map_err(|_| WatcherError::ManagerStopped.into())
    }

    /// Start tracking a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn start_watching(&self, file: TrackedFile) -> Result<TrackingResult> {
        self.call(|reply| Request::Start { file, reply }).await
    }

    /// Stop tracking a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn stop_watching(&self, path: impl Into<PathBuf>) -> Result<TrackingResult> {
        let path = path.into();
        self.call(|reply| Request::Stop { path, reply }).await
    }

    /// Every tracked file, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn list_watched(&self) -> Result<Vec<TrackedFile>> {
        self.call(|reply| Request::List { reply }).await
    }

    /// Directories that currently hold an OS watch, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the manager has stopped.
    pub async fn watched_dirs(&self) -> Result<Vec<PathBuf>> {
        self.call(|reply| Request::WatchedDirs { reply }).await
    }

    /// Tear down every watch and wait for the actor to exit.
    ///
    /// Calling this again after the manager stopped is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor task panicked.
    pub async fn stop_all(&self) -> Result<()> {
        if let Err(e) = self.call(|reply| Request::StopAll { reply }).await {
            tracing::debug!(error = %e, "Watch manager already stopped");
        }

        let task = self.task.lock().await.take();
        if let Some(task) = task {
            task.await
                .map_err(|e| Error::internal(format!("watch manager task failed: {e}")))?;
            tracing::info!("Watch manager stopped");
        }
        Ok(())
    }
}

struct ManagerActor {
    dirs: HashMap<PathBuf, DirectoryWatch>,
    config: ManagerConfig,
    reporter: Arc<dyn MetadataReporter>,
    events_tx: mpsc::UnboundedSender<DirectoryEvents>,
}

impl ManagerActor {
    async fn run(
        mut self,
        mut requests: mpsc::Receiver<Request>,
        mut events: mpsc::UnboundedReceiver<DirectoryEvents>,
    ) {
        loop {
            tokio::select! {
                request = requests.recv() => {
                    let Some(request) = request else {
                        // Every handle is gone.
                        self.stop_all().await;
                        break;
                    };
                    if !self.handle_request(request).await {
                        break;
                    }
                }
                Some(events) = events.recv() => {
                    self.handle_events(events).await;
                }
            }
        }
    }

    /// Apply one request. Returns `false` once the actor should exit.
    async fn handle_request(&mut self, request: Request) -> bool {
        match request {
            Request::Start { file, reply } => {
                let _ = reply.send(self.start_watching(file));
            }
            Request::Stop { path, reply } => {
                let result = self.stop_watching(&path).await;
                let _ = reply.send(result);
            }
            Request::List { reply } => {
                let _ = reply.send(self.list_watched());
            }
            Request::WatchedDirs { reply } => {
                let mut dirs: Vec<PathBuf> = self.dirs.keys().cloned().collect();
                dirs.sort();
                let _ = reply.send(dirs);
            }
            Request::StopAll { reply } => {
                self.stop_all().await;
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    fn start_watching(&mut self, file: TrackedFile) -> TrackingResult {
        let path = file.file_path.clone();
        if !path.exists() {
            return TrackingResult::not_found(path);
        }

        let Some(dir) = path.parent().map(Path::to_path_buf) else {
            return TrackingResult::watch_failed(path, "path has no parent directory");
        };

        let watch = match self.dirs.entry(dir) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                match DirectoryWatch::new(
                    entry.key().clone(),
                    self.config.debounce,
                    self.events_tx.clone(),
                ) {
                    Ok(watch) => entry.insert(watch),
                    Err(e) => {
                        tracing::error!(path = %path.display(), error = %e, "Failed to create directory watch");
                        return TrackingResult::watch_failed(path, e.to_string());
                    }
                }
            }
        };

        if watch.track(file) {
            tracing::info!(path = %path.display(), "Started tracking file");
            TrackingResult::in_progress(path)
        } else {
            TrackingResult::already(path)
        }
    }

    async fn stop_watching(&mut self, path: &Path) -> TrackingResult {
        if !path.exists() {
            return TrackingResult::not_found(path);
        }

        let Some(dir) = path.parent() else {
            return TrackingResult::already(path);
        };

        if self.untrack(dir, path).await {
            tracing::info!(path = %path.display(), "Stopped tracking file");
            TrackingResult::completed(path)
        } else {
            TrackingResult::already(path)
        }
    }

    /// Remove `path` from the watch on `dir`, tearing the watch down
    /// when nothing is left in it. Shared by commands and delete events.
    async fn untrack(&mut self, dir: &Path, path: &Path) -> bool {
        let Some(watch) = self.dirs.get_mut(dir) else {
            return false;
        };

        let removed = watch.untrack(path).is_some();
        if watch.is_empty() {
            if let Some(watch) = self.dirs.remove(dir) {
                watch.stop().await;
            }
        }
        removed
    }

    fn list_watched(&self) -> Vec<TrackedFile> {
        let mut files: Vec<TrackedFile> = self
            .dirs
            .values()
            .flat_map(|watch| watch.files().cloned())
            .collect();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        files
    }

    async fn handle_events(&mut self, events: DirectoryEvents) {
        let DirectoryEvents { dir, batch } = events;

        if let Some(watch) = self.dirs.get(&dir) {
            for path in &batch.modified {
                let Some(file) = watch.get(path) else {
                    continue;
                };
                tracing::info!(path = %path.display(), "File modified");
                match FileMetadata::capture(file) {
                    Ok(metadata) => self.reporter.report(metadata),
                    Err(e) => {
                        tracing::warn!(path = %path.display(), error = %e, "Failed to read file metadata");
                    }
                }
            }
        }

        for path in &batch.deleted {
            // The file may have been recreated since the event was queued.
            if path.exists() {
                tracing::debug!(path = %path.display(), "Ignoring stale delete event");
                continue;
            }
            if self.untrack(&dir, path).await {
                tracing::info!(path = %path.display(), "File deleted, stopped tracking");
            }
        }
    }

    async fn stop_all(&mut self) {
        let dirs: Vec<PathBuf> = self.dirs.keys().cloned().collect();
        for dir in dirs {
            if let Some(watch) = self.dirs.remove(&dir) {
                watch.stop().await;
            }
        }
    }
}
