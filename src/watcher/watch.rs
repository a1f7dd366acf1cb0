//! Single-directory watch using notify-rs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::events::{DirectoryEvents, EventBatch, WatchEvent};
use crate::error::WatcherError;
use crate::protocol::TrackedFile;

/// Non-recursive watch over one directory and the files tracked in it.
///
/// The debouncer callback runs on notify's thread and only classifies
/// and forwards events; a pump task moves them into the manager queue.
/// The tracked map is touched only by the manager.
pub struct DirectoryWatch {
    dir_path: PathBuf,
    files: HashMap<PathBuf, TrackedFile>,
    debouncer: Option<Debouncer<RecommendedWatcher>>,
    cancel: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl DirectoryWatch {
    /// Start watching `dir_path`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS watch cannot be established.
    pub fn new(
        dir_path: impl Into<PathBuf>,
        debounce: Duration,
        events_tx: mpsc::UnboundedSender<DirectoryEvents>,
    ) -> Result<Self, WatcherError> {
        let dir_path = dir_path.into();
        let (raw_tx, raw_rx) = mpsc::unbounded_channel();

        let mut debouncer = new_debouncer(
            debounce,
            move |result: std::result::Result<
                Vec<notify_debouncer_mini::DebouncedEvent>,
                notify::Error,
            >| {
                match result {
                    Ok(events) => {
                        let mut batch = EventBatch::new();
                        for event in events {
                            if matches!(event.kind, DebouncedEventKind::Any) {
                                batch.add(WatchEvent::classify(event.path));
                            }
                        }

                        if !batch.is_empty() {
                            let _ = raw_tx.send(batch);
                        }
                    }
                    Err(e) => {
                        tracing::error!("Watch error: {:?}", e);
                    }
                }
            },
        )
        .map_err(|e| WatcherError::watch_failed(&dir_path, e))?;

        debouncer
            .watcher()
            .watch(&dir_path, RecursiveMode::NonRecursive)
            .map_err(|e| WatcherError::watch_failed(&dir_path, e))?;

        let cancel = CancellationToken::new();
        let pump = tokio::spawn(pump_events(
            dir_path.clone(),
            raw_rx,
            events_tx,
            cancel.clone(),
        ));

        tracing::info!(dir = %dir_path.display(), "Watching directory");

        Ok(Self {
            dir_path,
            files: HashMap::new(),
            debouncer: Some(debouncer),
            cancel,
            pump: Some(pump),
        })
    }

    /// Track a file. Returns `false` if it was already tracked.
    pub fn track(&mut self, file: TrackedFile) -> bool {
        if self.files.contains_key(&file.file_path) {
            return false;
        }
        self.files.insert(file.file_path.clone(), file);
        true
    }

    /// Stop tracking a file, returning it if it was tracked.
    pub fn untrack(&mut self, path: &Path) -> Option<TrackedFile> {
        self.files.remove(path)
    }

    /// Look up a tracked file.
    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&TrackedFile> {
        self.files.get(path)
    }

    #[must_use]
    pub fn is_tracked(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    /// Tracked files in this directory.
    pub fn files(&self) -> impl Iterator<Item = &TrackedFile> {
        self.files.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Release the OS watch and wait for the pump task to finish.
    ///
    /// notify's own threads are signalled by the drop but cannot be joined.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        drop(self.debouncer.take());

        if let Some(pump) = self.pump.take() {
            if let Err(e) = pump.await {
                tracing::warn!(dir = %self.dir_path.display(), error = %e, "Event pump panicked");
            }
        }

        tracing::info!(dir = %self.dir_path.display(), "Stopped watching directory");
    }
}

impl Drop for DirectoryWatch {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl std::fmt::Debug for DirectoryWatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryWatch")
            .field("dir_path", &self.dir_path)
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

/// Forward raw batches to the manager until cancelled.
async fn pump_events(
    dir: PathBuf,
    mut raw_rx: mpsc::UnboundedReceiver<EventBatch>,
    events_tx: mpsc::UnboundedSender<DirectoryEvents>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            batch = raw_rx.recv() => {
                let Some(batch) = batch else { break };
                tracing::trace!(dir = %dir.display(), events = batch.len(), "Forwarding event batch");
                let events = DirectoryEvents {
                    dir: dir.clone(),
                    batch,
                };
                if events_tx.send(events).is_err() {
                    break;
                }
            }
        }
    }

    tracing::debug!(dir = %dir.display(), "Event pump stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const TEST_DEBOUNCE: Duration = Duration::from_millis(50);

    #[tokio::test]
    async fn test_watch_nonexistent_dir_fails() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = DirectoryWatch::new("/nonexistent/directory", TEST_DEBOUNCE, tx).unwrap_err();
        assert!(matches!(err, WatcherError::WatchFailed { .. }));
        assert!(err.to_string().contains("/nonexistent/directory"));
    }

    #[tokio::test]
    async fn test_track_and_untrack() {
        let tmp = TempDir::new().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut watch = DirectoryWatch::new(tmp.path(), TEST_DEBOUNCE, tx).unwrap();

        let path = tmp.path().join("a.csv");
        assert!(watch.is_empty());
        assert!(watch.track(TrackedFile::new(&path)));
        assert!(!watch.track(TrackedFile::new(&path).with_id(5)));
        assert_eq!(watch.len(), 1);
        assert!(watch.is_tracked(&path));
        assert_eq!(watch.get(&path).unwrap().id, None);

        assert!(watch.untrack(&path).is_some());
        assert!(watch.untrack(&path).is_none());
        assert!(watch.is_empty());

        watch.stop().await;
    }

    #[tokio::test]
    async fn test_modify_and_delete_are_forwarded() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("data.csv");
        fs::write(&path, "a,b\n").unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let watch = DirectoryWatch::new(tmp.path(), TEST_DEBOUNCE, tx).unwrap();

        fs::write(&path, "a,b\n1,2\n").unwrap();
        let events = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("no modify event")
            .unwrap();
        assert_eq!(events.dir, tmp.path());
        assert!(events.batch.modified.contains(&path));

        fs::remove_file(&path).unwrap();
        let deleted = tokio::time::timeout(Duration::from_secs(5), async {
            while let Some(events) = rx.recv().await {
                if events.batch.deleted.contains(&path) {
                    return true;
                }
            }
            false
        })
        .await
        .expect("no delete event");
        assert!(deleted);

        watch.stop().await;
    }

    #[tokio::test]
    async fn test_stop_closes_event_stream() {
        let tmp = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let watch = DirectoryWatch::new(tmp.path(), TEST_DEBOUNCE, tx).unwrap();

        watch.stop().await;

        // The only sender lived in the pump, which has exited.
        let next = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .unwrap();
        assert!(next.is_none());
    }
}
