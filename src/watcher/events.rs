//! File system event types and handling.

#![allow(clippy::missing_const_for_fn)]

use std::path::{Path, PathBuf};

/// Event for a single path inside a watched directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    /// File was created or modified.
    Modified(PathBuf),
    /// File was deleted or moved away.
    Deleted(PathBuf),
}

impl WatchEvent {
    /// Classify a debounced notification by whether the path still exists.
    #[must_use]
    pub fn classify(path: PathBuf) -> Self {
        if path.exists() {
            Self::Modified(path)
        } else {
            Self::Deleted(path)
        }
    }

    /// Get the path associated with this event.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::Modified(p) | Self::Deleted(p) => p,
        }
    }
}

/// Batch of file events for one debounce window.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct EventBatch {
    /// Modified files (need a metadata report).
    pub modified: Vec<PathBuf>,
    /// Deleted files (need to stop tracking).
    pub deleted: Vec<PathBuf>,
}

impl EventBatch {
    /// Create a new empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the batch.
    pub fn add(&mut self, event: WatchEvent) {
        match event {
            WatchEvent::Modified(path) => {
                self.deleted.retain(|p| p != &path);
                if !self.modified.contains(&path) {
                    self.modified.push(path);
                }
            }
            WatchEvent::Deleted(path) => {
                // Remove from modified if present
                self.modified.retain(|p| p != &path);
                if !self.deleted.contains(&path) {
                    self.deleted.push(path);
                }
            }
        }
    }

    /// Check if batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Get total number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modified.len() + self.deleted.len()
    }
}

/// Events raised by one directory watch, tagged with its directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEvents {
    pub dir: PathBuf,
    pub batch: EventBatch,
}
