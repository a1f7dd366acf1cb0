//! Results sent from the server back to the client.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::command::TrackedFile;
use super::configuration::ServerConfiguration;

/// Outcome of an add or remove request for one path.
///
/// Under `add`: `InProgress` (newly tracked), `Already` (already tracked),
/// `NotFound` (path absent), `WatchFailed` (OS watch could not be created).
/// Under `remove`: `Completed` (tracking stopped), `Already` (was not
/// tracked), `NotFound` (path absent).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrackingStatus {
    InProgress,
    Completed,
    Already,
    NotFound,
    WatchFailed,
}

impl fmt::Display for TrackingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Already => "ALREADY",
            Self::NotFound => "NOT_FOUND",
            Self::WatchFailed => "WATCH_FAILED",
        };
        f.write_str(s)
    }
}

/// Status for a single path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingResult {
    pub status: TrackingStatus,
    pub file_path: PathBuf,
    /// Failure detail, only set for `WatchFailed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TrackingResult {
    fn new(status: TrackingStatus, file_path: impl Into<PathBuf>) -> Self {
        Self {
            status,
            file_path: file_path.into(),
            reason: None,
        }
    }

    pub fn in_progress(file_path: impl Into<PathBuf>) -> Self {
        Self::new(TrackingStatus::InProgress, file_path)
    }

    pub fn completed(file_path: impl Into<PathBuf>) -> Self {
        Self::new(TrackingStatus::Completed, file_path)
    }

    pub fn already(file_path: impl Into<PathBuf>) -> Self {
        Self::new(TrackingStatus::Already, file_path)
    }

    pub fn not_found(file_path: impl Into<PathBuf>) -> Self {
        Self::new(TrackingStatus::NotFound, file_path)
    }

    pub fn watch_failed(file_path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(TrackingStatus::WatchFailed, file_path)
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

/// A single response from the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "lowercase")]
pub enum CommandResult {
    /// One entry per input path of an add or remove, in input order.
    Tracking { results: Vec<TrackingResult> },
    /// Every tracked file.
    Tracked { files: Vec<TrackedFile> },
    /// Server configuration snapshot.
    Ping { configuration: ServerConfiguration },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Transport;

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&TrackingStatus::InProgress).unwrap();
        assert_eq!(json, r#""IN_PROGRESS""#);
        let json = serde_json::to_string(&TrackingStatus::NotFound).unwrap();
        assert_eq!(json, r#""NOT_FOUND""#);
    }

    #[test]
    fn test_status_display_matches_wire() {
        for status in [
            TrackingStatus::InProgress,
            TrackingStatus::Completed,
            TrackingStatus::Already,
            TrackingStatus::NotFound,
            TrackingStatus::WatchFailed,
        ] {
            let wire = serde_json::to_string(&status).unwrap();
            assert_eq!(wire.trim_matches('"'), status.to_string());
        }
    }

    #[test]
    fn test_tracking_result_wire_format() {
        let result = CommandResult::Tracking {
            results: vec![
                TrackingResult::in_progress("/tmp/a.txt"),
                TrackingResult::not_found("/tmp/missing.txt"),
            ],
        };
        let json = serde_json::to_string(&result).unwrap();
        insta::assert_snapshot!(json, @r#"{"result":"tracking","results":[{"status":"IN_PROGRESS","file_path":"/tmp/a.txt"},{"status":"NOT_FOUND","file_path":"/tmp/missing.txt"}]}"#);
    }

    #[test]
    fn test_watch_failed_carries_reason() {
        let result = TrackingResult::watch_failed("/data/x", "too many open files");
        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains(r#""reason":"too many open files""#));
        assert_eq!(result.status, TrackingStatus::WatchFailed);
    }

    #[test]
    fn test_ping_result_wire_format() {
        let mut configuration = ServerConfiguration::new(
            Transport::Tcp {
                host: "127.0.0.1".to_string(),
                port: 9998,
            },
            false,
        );
        configuration.set_pid(42).unwrap();
        let json = serde_json::to_string(&CommandResult::Ping { configuration }).unwrap();
        insta::assert_snapshot!(json, @r#"{"result":"ping","configuration":{"transport":{"mode":"tcp","host":"127.0.0.1","port":9998},"release":false,"pid":42}}"#);
    }

    #[test]
    fn test_unknown_result_rejected() {
        assert!(serde_json::from_str::<CommandResult>(r#"{"result":"exit"}"#).is_err());
    }
}
