//! Per-connection request handling.

use std::sync::Arc;
use std::time::Duration;

use tracing::Instrument;

use super::observability::spans;
use crate::error::TransportError;
use crate::protocol::{read_message, write_message, Command, CommandResult, ServerConfiguration};
use crate::transport::BoxedConnection;
use crate::watcher::WatchManager;
use crate::Result;

/// Routes decoded commands to the watch manager.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    manager: Arc<WatchManager>,
    configuration: ServerConfiguration,
    io_timeout: Duration,
}

impl Dispatcher {
    #[must_use]
    pub const fn new(
        manager: Arc<WatchManager>,
        configuration: ServerConfiguration,
        io_timeout: Duration,
    ) -> Self {
        Self {
            manager,
            configuration,
            io_timeout,
        }
    }

    #[must_use]
    pub const fn configuration(&self) -> &ServerConfiguration {
        &self.configuration
    }

    /// Execute one command.
    ///
    /// Paths in `Add` and `Remove` are handled in request order and each
    /// gets exactly one result.
    ///
    /// # Errors
    ///
    /// Returns an error only if the watch manager has stopped.
    pub async fn dispatch(&self, command: Command) -> Result<CommandResult> {
        match command {
            Command::Add { files } => {
                let mut results = Vec::with_capacity(files.len());
                for file in files {
                    results.push(self.manager.start_watching(file).await?);
                }
                Ok(CommandResult::Tracking { results })
            }
            Command::Remove { file_paths } => {
                let mut results = Vec::with_capacity(file_paths.len());
                for path in file_paths {
                    results.push(self.manager.stop_watching(path).await?);
                }
                Ok(CommandResult::Tracking { results })
            }
            Command::List => Ok(CommandResult::Tracked {
                files: self.manager.list_watched().await?,
            }),
            Command::Ping => Ok(CommandResult::Ping {
                configuration: self.configuration.clone(),
            }),
        }
    }

    /// Serve a single exchange: read one command, answer it, close.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be decoded, the exchange
    /// times out, or the response cannot be written. No state is changed
    /// when decoding fails.
    pub async fn handle_connection(&self, mut stream: BoxedConnection) -> Result<()> {
        let command: Command = tokio::time::timeout(self.io_timeout, read_message(&mut stream))
            .await
            .map_err(|_| TransportError::Timeout("reading request"))??;

        let span = spans::command_span(command.name());
        let result = self.dispatch(command).instrument(span).await?;

        tokio::time::timeout(self.io_timeout, write_message(&mut stream, &result))
            .await
            .map_err(|_| TransportError::Timeout("writing response"))??;

        tracing::debug!("Response sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{TrackedFile, TrackingStatus, Transport};
    use crate::watcher::{LogReporter, ManagerConfig};
    use crate::Error;
    use std::fs;
    use tempfile::TempDir;
    use tokio::io::AsyncWriteExt;

    fn dispatcher() -> Dispatcher {
        let manager = WatchManager::start(ManagerConfig::default(), Arc::new(LogReporter));
        let mut configuration = ServerConfiguration::new(
            Transport::Tcp {
                host: "127.0.0.1".to_string(),
                port: 9998,
            },
            false,
        );
        configuration.set_pid(7).unwrap();
        Dispatcher::new(Arc::new(manager), configuration, Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_dispatch_ping_returns_configuration() {
        let dispatcher = dispatcher();
        let result = dispatcher.dispatch(Command::Ping).await.unwrap();
        match result {
            CommandResult::Ping { configuration } => assert_eq!(configuration.pid(), Some(7)),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dispatch_add_keeps_request_order() {
        let tmp = TempDir::new().unwrap();
        let present = tmp.path().join("a.txt");
        fs::write(&present, "a").unwrap();
        let missing = tmp.path().join("missing.txt");

        let dispatcher = dispatcher();
        let result = dispatcher
            .dispatch(Command::add([present.clone(), missing.clone()]))
            .await
            .unwrap();

        let CommandResult::Tracking { results } = result else {
            panic!("expected tracking result");
        };
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].status, TrackingStatus::InProgress);
        assert_eq!(results[0].file_path, present);
        assert_eq!(results[1].status, TrackingStatus::NotFound);
        assert_eq!(results[1].file_path, missing);

        let listed = dispatcher.dispatch(Command::List).await.unwrap();
        assert_eq!(
            listed,
            CommandResult::Tracked {
                files: vec![TrackedFile::new(present)]
            }
        );

        dispatcher.manager.stop_all().await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_remove_untracked() {
        let tmp = TempDir::new().unwrap();
        let file = tmp.path().join("b.txt");
        fs::write(&file, "b").unwrap();

        let dispatcher = dispatcher();
        let result = dispatcher
            .dispatch(Command::remove([file.clone()]))
            .await
            .unwrap();
        let CommandResult::Tracking { results } = result else {
            panic!("expected tracking result");
        };
        assert_eq!(results[0].status, TrackingStatus::Already);
    }

    #[tokio::test]
    async fn test_handle_connection_answers_one_command() {
        let dispatcher = dispatcher();
        let (client, server) = tokio::io::duplex(4096);

        let handler = tokio::spawn(async move {
            dispatcher
                .handle_connection(Box::new(server))
                .await
        });

        let mut client = client;
        write_message(&mut client, &Command::Ping).await.unwrap();
        let result: CommandResult = read_message(&mut client).await.unwrap();
        assert!(matches!(result, CommandResult::Ping { .. }));
        handler.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_handle_connection_rejects_garbage() {
        let dispatcher = dispatcher();
        let (mut client, server) = tokio::io::duplex(4096);

        client.write_all(&5u32.to_be_bytes()).await.unwrap();
        client.write_all(b"nope!").await.unwrap();
        client.shutdown().await.unwrap();

        let err = dispatcher
            .handle_connection(Box::new(server))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
        let listed = dispatcher.dispatch(Command::List).await.unwrap();
        assert_eq!(listed, CommandResult::Tracked { files: vec![] });
    }

    #[tokio::test]
    async fn test_handle_connection_times_out_on_idle_peer() {
        let manager = WatchManager::start(ManagerConfig::default(), Arc::new(LogReporter));
        let dispatcher = Dispatcher::new(
            Arc::new(manager),
            ServerConfiguration::new(
                Transport::Tcp {
                    host: "127.0.0.1".to_string(),
                    port: 9998,
                },
                false,
            ),
            Duration::from_millis(200),
        );

        // Keep the client half open and silent.
        let (_client, server) = tokio::io::duplex(4096);

        let err = dispatcher
            .handle_connection(Box::new(server))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Transport(TransportError::Timeout("reading request"))
        ));
    }
}
