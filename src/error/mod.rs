//! Error types and Result aliases for file-tracker.
//!
//! This module defines the error hierarchy used throughout the crate.
//! All public functions return `Result<T, Error>` or `Result<T>`.

use thiserror::Error;

/// Result type alias using file-tracker's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for file-tracker operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed or unexpected wire message.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Connection-level failure between client and server.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// File watching error.
    #[error("watcher error: {0}")]
    Watcher(#[from] WatcherError),

    /// PID file and process management error.
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Wire protocol errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Payload is not a valid message.
    #[error("failed to decode message: {0}")]
    Decode(String),

    /// Message could not be serialized.
    #[error("failed to encode message: {0}")]
    Encode(String),

    /// Frame exceeded the configured limit.
    #[error("frame too large: {size} bytes (limit {limit})")]
    FrameTooLarge { size: usize, limit: usize },

    /// Peer closed the connection before a full frame arrived.
    #[error("connection closed before a complete message was received")]
    UnexpectedEof,

    /// Server answered with a result that does not match the command.
    #[error("unexpected result for '{command}' command")]
    UnexpectedResult { command: &'static str },
}

/// Transport errors.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Failed to connect to the server.
    #[error("failed to connect to {address}: {reason}")]
    Connect { address: String, reason: String },

    /// Failed to bind the listener.
    #[error("failed to bind to {address}: {reason}")]
    BindFailed { address: String, reason: String },

    /// An I/O step did not finish in time.
    #[error("timed out while {0}")]
    Timeout(&'static str),

    /// Transport is not available on this platform.
    #[error("unsupported transport: {0}")]
    Unsupported(String),
}

/// File watcher errors.
#[derive(Error, Debug)]
pub enum WatcherError {
    /// Failed to watch path.
    #[error("failed to watch path '{path}': {reason}")]
    WatchFailed { path: String, reason: String },

    /// The manager task is no longer running.
    #[error("watch manager has stopped")]
    ManagerStopped,
}

/// Runtime file and process errors.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// PID file is missing or does not hold a process id.
    #[error("invalid PID file '{path}': {reason}")]
    InvalidPidFile { path: String, reason: String },

    /// Server process is not running.
    #[error("server is not running")]
    NotRunning,

    /// Server process could not be signalled.
    #[error("failed to signal process {pid}")]
    SignalFailed { pid: u32 },

    /// Server did not come up in time.
    #[error("server did not start within {0:?}")]
    StartTimeout(std::time::Duration),

    /// A runtime value was assigned twice.
    #[error("{0} is already set")]
    AlreadySet(&'static str),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl WatcherError {
    /// Create a watch failure for a path.
    pub fn watch_failed(path: impl AsRef<std::path::Path>, reason: impl ToString) -> Self {
        Self::WatchFailed {
            path: path.as_ref().display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode(e.to_string())
    }
}
