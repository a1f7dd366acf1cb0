//! Server configuration snapshot shared with clients.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::RuntimeError;

/// How clients reach the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum Transport {
    /// Local Unix domain socket.
    Unix { socket_path: PathBuf },
    /// TCP on host and port.
    Tcp { host: String, port: u16 },
}

impl Transport {
    /// Socket path for Unix transports.
    #[must_use]
    pub fn socket_path(&self) -> Option<&PathBuf> {
        match self {
            Self::Unix { socket_path } => Some(socket_path),
            Self::Tcp { .. } => None,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix { socket_path } => write!(f, "unix:{}", socket_path.display()),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

/// Configuration the server runs with, reported by `ping`.
///
/// The transport and release flag are fixed at construction. The process id
/// is assigned once after startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfiguration {
    transport: Transport,
    release: bool,
    #[serde(default)]
    pid: Option<u32>,
}

impl ServerConfiguration {
    #[must_use]
    pub const fn new(transport: Transport, release: bool) -> Self {
        Self {
            transport,
            release,
            pid: None,
        }
    }

    /// Record the server process id.
    ///
    /// # Errors
    ///
    /// Returns an error if the pid was already set.
    pub fn set_pid(&mut self, pid: u32) -> Result<(), RuntimeError> {
        if self.pid.is_some() {
            return Err(RuntimeError::AlreadySet("pid"));
        }
        self.pid = Some(pid);
        Ok(())
    }

    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    #[must_use]
    pub const fn release(&self) -> bool {
        self.release
    }

    #[must_use]
    pub const fn pid(&self) -> Option<u32> {
        self.pid
    }
}
