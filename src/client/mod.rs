//! Client side of the tracking protocol.
//!
//! Every call opens a fresh connection, sends one command, reads one
//! result and closes. There are no retries.

mod format;
mod process;

use std::path::PathBuf;
use std::time::Duration;

pub use format::{format_add, format_configuration, format_list, format_remove};
pub use process::{is_server_running, process_exists, start_server, stop_server};

use crate::error::{ProtocolError, TransportError};
use crate::protocol::{
    read_message, write_message, Command, CommandResult, ServerConfiguration, TrackedFile,
    TrackingResult, Transport,
};
use crate::runtime::read_transport;
use crate::transport::connect;
use crate::{Config, Result};

/// Connection settings for talking to one server.
#[derive(Debug, Clone)]
pub struct Client {
    transport: Transport,
    io_timeout: Duration,
}

impl Client {
    #[must_use]
    pub const fn new(transport: Transport, io_timeout: Duration) -> Self {
        Self {
            transport,
            io_timeout,
        }
    }

    /// Client for the server described by `config`.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.transport(), config.io_timeout)
    }

    /// Client for the server running out of `config.runtime_dir`.
    ///
    /// Uses the transport the server recorded at startup, so a server
    /// started over TCP stays reachable from a default client. Falls back
    /// to the transport in `config` when no marker exists.
    #[must_use]
    pub fn discover(config: &Config) -> Self {
        let transport = read_transport(&config.state_file()).unwrap_or_else(|| config.transport());
        Self::new(transport, config.io_timeout)
    }

    #[must_use]
    pub const fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Send one command and wait for its result.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot be reached, an exchange step
    /// times out, or the reply cannot be decoded.
    pub async fn send(&self, command: &Command) -> Result<CommandResult> {
        let mut stream = connect(&self.transport, self.io_timeout).await?;

        tokio::time::timeout(self.io_timeout, write_message(&mut stream, command))
            .await
            .map_err(|_| TransportError::Timeout("writing request"))??;

        let result = tokio::time::timeout(self.io_timeout, read_message(&mut stream))
            .await
            .map_err(|_| TransportError::Timeout("reading response"))??;

        tracing::debug!(command = command.name(), "Received result");
        Ok(result)
    }

    /// Start tracking files.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the server answers with
    /// the wrong result kind.
    pub async fn add(&self, files: Vec<TrackedFile>) -> Result<Vec<TrackingResult>> {
        let command = Command::Add { files };
        match self.send(&command).await? {
            CommandResult::Tracking { results } => Ok(results),
            _ => Err(unexpected(&command)),
        }
    }

    /// Stop tracking files.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the server answers with
    /// the wrong result kind.
    pub async fn remove(&self, file_paths: Vec<PathBuf>) -> Result<Vec<TrackingResult>> {
        let command = Command::Remove { file_paths };
        match self.send(&command).await? {
            CommandResult::Tracking { results } => Ok(results),
            _ => Err(unexpected(&command)),
        }
    }

    /// List tracked files.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the server answers with
    /// the wrong result kind.
    pub async fn list(&self) -> Result<Vec<TrackedFile>> {
        let command = Command::List;
        match self.send(&command).await? {
            CommandResult::Tracked { files } => Ok(files),
            _ => Err(unexpected(&command)),
        }
    }

    /// Fetch the server configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the exchange fails or the server answers with
    /// the wrong result kind.
    pub async fn ping(&self) -> Result<ServerConfiguration> {
        let command = Command::Ping;
        match self.send(&command).await? {
            CommandResult::Ping { configuration } => Ok(configuration),
            _ => Err(unexpected(&command)),
        }
    }
}

fn unexpected(command: &Command) -> crate::Error {
    ProtocolError::UnexpectedResult {
        command: command.name(),
    }
    .into()
}

/// Send one command to the server running out of `config.runtime_dir`.
///
/// # Errors
///
/// Returns an error if the exchange fails.
pub async fn send_command(config: &Config, command: &Command) -> Result<CommandResult> {
    Client::discover(config).send(command).await
}
