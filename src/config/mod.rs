//! Configuration management for file-tracker.
//!
//! Supports configuration from:
//! - Command-line arguments (highest priority)
//! - Environment variables (`FILE_TRACKER_*`)
//! - Built-in defaults

mod settings;

pub use settings::{Config, DEFAULT_COLLECTOR_URL};
