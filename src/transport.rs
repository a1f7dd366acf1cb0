//! Socket transports shared by the server and the client.

use std::io;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

use crate::error::TransportError;
use crate::protocol::Transport;
use crate::Result;

/// A bidirectional byte stream, TCP or Unix.
pub trait Connection: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T> Connection for T where T: AsyncRead + AsyncWrite + Unpin + Send {}

pub type BoxedConnection = Box<dyn Connection>;

/// Bound server socket.
#[derive(Debug)]
pub enum Listener {
    Tcp(TcpListener),
    #[cfg(unix)]
    Unix(UnixListener),
}

impl Listener {
    /// Bind the listener for a transport.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound or the transport is
    /// unsupported on this platform.
    pub async fn bind(transport: &Transport) -> Result<Self> {
        let bind_failed = |e: io::Error| TransportError::BindFailed {
            address: transport.to_string(),
            reason: e.to_string(),
        };

        match transport {
            Transport::Tcp { host, port } => {
                let listener = TcpListener::bind((host.as_str(), *port))
                    .await
                    .map_err(bind_failed)?;
                Ok(Self::Tcp(listener))
            }
            #[cfg(unix)]
            Transport::Unix { socket_path } => {
                let listener = UnixListener::bind(socket_path).map_err(bind_failed)?;
                Ok(Self::Unix(listener))
            }
            #[cfg(not(unix))]
            Transport::Unix { .. } => {
                Err(TransportError::Unsupported("unix sockets".to_string()).into())
            }
        }
    }

    /// Accept the next connection, with a printable peer description.
    ///
    /// # Errors
    ///
    /// Returns the underlying accept error.
    pub async fn accept(&self) -> io::Result<(BoxedConnection, String)> {
        match self {
            Self::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                Ok((Box::new(stream), addr.to_string()))
            }
            #[cfg(unix)]
            Self::Unix(listener) => {
                let (stream, _) = listener.accept().await?;
                Ok((Box::new(stream), "unix".to_string()))
            }
        }
    }

    /// Transport clients should use to reach this listener.
    ///
    /// For TCP this reflects the actual port when bound to port 0.
    ///
    /// # Errors
    ///
    /// Returns an error if the local address cannot be read.
    pub fn local_transport(&self) -> io::Result<Transport> {
        match self {
            Self::Tcp(listener) => {
                let addr = listener.local_addr()?;
                Ok(Transport::Tcp {
                    host: addr.ip().to_string(),
                    port: addr.port(),
                })
            }
            #[cfg(unix)]
            Self::Unix(listener) => {
                let addr = listener.local_addr()?;
                let socket_path = addr
                    .as_pathname()
                    .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "unnamed unix socket"))?
                    .to_path_buf();
                Ok(Transport::Unix { socket_path })
            }
        }
    }
}

/// Open a connection to the server.
///
/// # Errors
///
/// Returns an error if the connection is refused or does not complete
/// within `timeout`.
pub async fn connect(transport: &Transport, timeout: Duration) -> Result<BoxedConnection> {
    let connecting = async {
        match transport {
            Transport::Tcp { host, port } => TcpStream::connect((host.as_str(), *port))
                .await
                .map(|s| Box::new(s) as BoxedConnection),
            #[cfg(unix)]
            Transport::Unix { socket_path } => UnixStream::connect(socket_path)
                .await
                .map(|s| Box::new(s) as BoxedConnection),
            #[cfg(not(unix))]
            Transport::Unix { .. } => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "unix sockets are not available",
            )),
        }
    };

    match tokio::time::timeout(timeout, connecting).await {
        Ok(Ok(stream)) => Ok(stream),
        Ok(Err(e)) => Err(TransportError::Connect {
            address: transport.to_string(),
            reason: e.to_string(),
        }
        .into()),
        Err(_) => Err(TransportError::Timeout("connecting").into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_tcp_bind_reports_actual_port() {
        let listener = Listener::bind(&Transport::Tcp {
            host: "127.0.0.1".to_string(),
            port: 0,
        })
        .await
        .unwrap();

        match listener.local_transport().unwrap() {
            Transport::Tcp { host, port } => {
                assert_eq!(host, "127.0.0.1");
                assert_ne!(port, 0);
            }
            Transport::Unix { .. } => panic!("expected tcp transport"),
        }
    }

    #[tokio::test]
    async fn test_tcp_connect_and_accept() {
        let listener = Listener::bind(&Transport::Tcp {
            host: "127.0.0.1".to_string(),
            port: 0,
        })
        .await
        .unwrap();
        let transport = listener.local_transport().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, peer) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            (buf, peer)
        });

        let mut client = connect(&transport, Duration::from_secs(5)).await.unwrap();
        client.write_all(b"ping").await.unwrap();

        let (buf, peer) = server.await.unwrap();
        assert_eq!(&buf, b"ping");
        assert!(peer.starts_with("127.0.0.1:"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_connect_and_accept() {
        let tmp = tempfile::TempDir::new().unwrap();
        let transport = Transport::Unix {
            socket_path: tmp.path().join("test.sock"),
        };
        let listener = Listener::bind(&transport).await.unwrap();
        assert_eq!(listener.local_transport().unwrap(), transport);

        let server = tokio::spawn(async move { listener.accept().await.unwrap().1 });
        let _client = connect(&transport, Duration::from_secs(5)).await.unwrap();
        assert_eq!(server.await.unwrap(), "unix");
    }

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        let listener = Listener::bind(&Transport::Tcp {
            host: "127.0.0.1".to_string(),
            port: 0,
        })
        .await
        .unwrap();
        let transport = listener.local_transport().unwrap();
        drop(listener);

        let err = connect(&transport, Duration::from_secs(5)).await.err().unwrap();
        assert!(matches!(err, Error::Transport(TransportError::Connect { .. })));
    }
}
