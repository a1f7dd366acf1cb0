//! Main application server.
//!
//! Provides the complete server application with signal handling
//! and graceful shutdown coordination.

use std::future::Future;
use std::sync::Arc;

use tokio::signal;
use tokio::task::JoinSet;
use tracing::Instrument;
use uuid::Uuid;

use super::dispatch::Dispatcher;
use super::observability::spans;
use crate::protocol::ServerConfiguration;
use crate::runtime::RuntimeFiles;
use crate::transport::Listener;
use crate::watcher::WatchManager;
use crate::{Config, Result};

/// Application server.
#[derive(Debug)]
pub struct App {
    config: Config,
    manager: Arc<WatchManager>,
    configuration: ServerConfiguration,
}

impl App {
    /// Create a new application around a running watch manager.
    ///
    /// The server configuration is fixed here, including this process's
    /// id.
    ///
    /// # Errors
    ///
    /// Returns an error if the process id was already recorded.
    pub fn new(config: Config, manager: WatchManager) -> Result<Self> {
        let mut configuration = ServerConfiguration::new(config.transport(), config.release);
        configuration.set_pid(std::process::id())?;

        Ok(Self {
            config,
            manager: Arc::new(manager),
            configuration,
        })
    }

    #[must_use]
    pub const fn configuration(&self) -> &ServerConfiguration {
        &self.configuration
    }

    /// Run the server until shutdown signal.
    ///
    /// The server listens for SIGTERM (Unix) and Ctrl+C signals,
    /// then gracefully shuts down all connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the server cannot start or encounters
    /// a fatal error during execution.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run the server until `shutdown` completes.
    ///
    /// On shutdown the listener is closed, in-flight connections get
    /// `shutdown_timeout` to finish, every watch is torn down and the
    /// runtime files are removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime files cannot be written, the
    /// listener cannot be bound, or the watch manager fails to stop.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        let runtime_files = RuntimeFiles::create(&self.config, std::process::id())?;

        let listener = match Listener::bind(self.configuration.transport()).await {
            Ok(listener) => listener,
            Err(e) => {
                runtime_files.clear();
                self.manager.stop_all().await?;
                return Err(e);
            }
        };

        tracing::info!(
            transport = %self.configuration.transport(),
            pid = ?self.configuration.pid(),
            release = self.configuration.release(),
            "Server listening"
        );

        self.accept_loop(listener, shutdown).await;

        let stopped = self.manager.stop_all().await;
        runtime_files.clear();
        stopped?;

        tracing::info!("Server shut down gracefully");
        Ok(())
    }

    async fn accept_loop(&self, listener: Listener, shutdown: impl Future<Output = ()>) {
        let dispatcher = Dispatcher::new(
            Arc::clone(&self.manager),
            self.configuration.clone(),
            self.config.io_timeout,
        );
        let mut connections = JoinSet::new();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let dispatcher = dispatcher.clone();
                        let connection_id = Uuid::new_v4().to_string();
                        let span = spans::connection_span(&connection_id, &peer);
                        connections.spawn(
                            async move {
                                if let Err(e) = dispatcher.handle_connection(stream).await {
                                    tracing::warn!(error = %e, "Connection failed");
                                }
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept connection");
                    }
                },
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!(error = %e, "Connection task failed");
                    }
                }
            }
        }

        drop(listener);
        tracing::info!(in_flight = connections.len(), "Stopped accepting connections");

        let drained = tokio::time::timeout(self.config.shutdown_timeout, async {
            while let Some(joined) = connections.join_next().await {
                if let Err(e) = joined {
                    tracing::error!(error = %e, "Connection task failed");
                }
            }
        })
        .await
        .is_ok();

        if !drained {
            tracing::warn!(
                remaining = connections.len(),
                "Shutdown timeout reached, aborting connections"
            );
            connections.abort_all();
        }
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }
}
