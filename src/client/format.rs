//! Human-readable rendering of command results.

use std::fmt::Write;

use crate::protocol::{ServerConfiguration, TrackedFile, TrackingResult, TrackingStatus};

/// Render the results of an `add` command.
#[must_use]
pub fn format_add(results: &[TrackingResult]) -> String {
    let mut out = String::from("The result of adding files to tracking:");
    for result in results {
        let path = result.file_path.display();
        let _ = match result.status {
            TrackingStatus::InProgress => write!(out, "\n- file tracking started: {path}"),
            TrackingStatus::Already => write!(out, "\n- file is already being tracked: {path}"),
            TrackingStatus::NotFound => write!(out, "\n- file not found: {path}"),
            TrackingStatus::WatchFailed => write!(
                out,
                "\n- file could not be watched: {path} ({})",
                result.reason.as_deref().unwrap_or("unknown reason")
            ),
            TrackingStatus::Completed => write!(out, "\n- {path}: {}", result.status),
        };
    }
    out
}

/// Render the results of a `remove` command.
#[must_use]
pub fn format_remove(results: &[TrackingResult]) -> String {
    let mut out = String::from("The result of remove files from tracking:");
    for result in results {
        let path = result.file_path.display();
        let _ = match result.status {
            TrackingStatus::Completed => write!(out, "\n- file tracking stopped: {path}"),
            TrackingStatus::Already => write!(out, "\n- file is not tracked: {path}"),
            TrackingStatus::NotFound => write!(out, "\n- file not found: {path}"),
            TrackingStatus::InProgress | TrackingStatus::WatchFailed => {
                write!(out, "\n- {path}: {}", result.status)
            }
        };
    }
    out
}

/// Render the tracked file list.
#[must_use]
pub fn format_list(files: &[TrackedFile]) -> String {
    let mut out = String::from("List of tracked files:");
    for file in files {
        let _ = match file.id {
            Some(id) => write!(out, "\n- {} (id={id})", file.file_path.display()),
            None => write!(out, "\n- {}", file.file_path.display()),
        };
    }
    out
}

/// Render the server configuration as `- key=value` lines.
#[must_use]
pub fn format_configuration(configuration: &ServerConfiguration) -> String {
    let mut lines = vec![
        format!("- transport={}", configuration.transport()),
        format!("- release={}", configuration.release()),
    ];
    if let Some(pid) = configuration.pid() {
        lines.push(format!("- pid={pid}"));
    }
    lines.join("\n")
}
