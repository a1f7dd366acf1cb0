//! File tracking.
//!
//! This module provides:
//! - Per-directory, non-recursive watches using notify-rs
//! - The watch manager that owns them and applies every mutation in order
//! - Metadata capture and fire-and-forget reporting for modified files

mod events;
mod manager;
mod metadata;
mod reporter;
mod watch;

pub use events::{DirectoryEvents, EventBatch, WatchEvent};
pub use manager::{ManagerConfig, WatchManager};
pub use metadata::FileMetadata;
pub use reporter::{HttpReporter, LogReporter, MetadataReporter};
pub use watch::DirectoryWatch;
