//! Commands sent from the client to the server.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// A file the daemon has been asked to track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackedFile {
    /// Absolute path of the file.
    pub file_path: PathBuf,
    /// Dataset record id forwarded to the collector.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl TrackedFile {
    /// Create a tracked file without a dataset id.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            id: None,
        }
    }

    /// Attach a dataset id.
    #[must_use]
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.file_path
    }
}

impl From<PathBuf> for TrackedFile {
    fn from(file_path: PathBuf) -> Self {
        Self::new(file_path)
    }
}

impl From<&str> for TrackedFile {
    fn from(file_path: &str) -> Self {
        Self::new(file_path)
    }
}

/// A single request to the server.
///
/// Every connection carries exactly one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "lowercase")]
pub enum Command {
    /// Start tracking files.
    Add { files: Vec<TrackedFile> },
    /// Stop tracking files.
    Remove { file_paths: Vec<PathBuf> },
    /// List tracked files.
    List,
    /// Fetch the server configuration.
    Ping,
}

impl Command {
    /// Build an `Add` command from plain paths.
    pub fn add<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::Add {
            files: paths
                .into_iter()
                .map(|p| TrackedFile::new(p.into()))
                .collect(),
        }
    }

    /// Build a `Remove` command from plain paths.
    pub fn remove<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self::Remove {
            file_paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    /// Wire name of the command.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Remove { .. } => "remove",
            Self::List => "list",
            Self::Ping => "ping",
        }
    }
}
