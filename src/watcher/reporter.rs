//! Fire-and-forget delivery of file metadata to the collector.

use std::time::Duration;

use reqwest::StatusCode;

use super::metadata::FileMetadata;
use crate::{Error, Result};

/// Receives metadata snapshots for modified files.
///
/// Implementations must not block the caller: the manager calls this
/// while processing events.
pub trait MetadataReporter: Send + Sync {
    fn report(&self, metadata: FileMetadata);
}

/// Posts snapshots to an HTTP collector from a spawned task.
///
/// Failures are logged and dropped, never retried.
#[derive(Debug, Clone)]
pub struct HttpReporter {
    client: reqwest::Client,
    url: String,
}

impl HttpReporter {
    /// Create a reporter for the given endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::internal(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: url.into(),
        })
    }

    async fn send(client: reqwest::Client, url: String, metadata: FileMetadata) {
        match client.post(&url).json(&metadata).send().await {
            Ok(response) if response.status() == StatusCode::OK => {
                tracing::info!(path = %metadata.file_path.display(), "Metadata sent");
            }
            Ok(response) => {
                tracing::warn!(
                    path = %metadata.file_path.display(),
                    status = %response.status(),
                    "Collector rejected metadata"
                );
            }
            Err(e) => {
                tracing::warn!(path = %metadata.file_path.display(), error = %e, "Couldn't send metadata");
            }
        }
    }
}

impl MetadataReporter for HttpReporter {
    fn report(&self, metadata: FileMetadata) {
        tokio::spawn(Self::send(self.client.clone(), self.url.clone(), metadata));
    }
}

/// Reporter used when no collector is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl MetadataReporter for LogReporter {
    fn report(&self, metadata: FileMetadata) {
        tracing::debug!(
            path = %metadata.file_path.display(),
            size = metadata.size,
            modified = %metadata.last_modification_date,
            "Metadata captured (no collector configured)"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::path::PathBuf;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sample() -> FileMetadata {
        FileMetadata {
            hostname: "host".to_string(),
            file_path: PathBuf::from("/data/x.csv"),
            dataset_general_info_id: Some(4),
            age: Utc::now(),
            access_rights: "644".to_string(),
            last_access_date: Utc::now(),
            last_modification_date: Utc::now(),
            size: 10,
        }
    }

    #[tokio::test]
    async fn test_http_reporter_posts_json() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 8192];
            let mut received = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received);
                if n == 0 || text.contains("\"size\":10") {
                    break;
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await
                .unwrap();
            String::from_utf8_lossy(&received).into_owned()
        });

        let reporter =
            HttpReporter::new(format!("http://{addr}/client/add_event"), Duration::from_secs(5))
                .unwrap();
        reporter.report(sample());

        let request = tokio::time::timeout(Duration::from_secs(5), server)
            .await
            .unwrap()
            .unwrap();
        assert!(request.starts_with("POST /client/add_event"));
        assert!(request.contains("\"dataset_general_info_id\":4"));
    }

    #[tokio::test]
    async fn test_http_reporter_survives_unreachable_collector() {
        let reporter =
            HttpReporter::new("http://127.0.0.1:9/add_event", Duration::from_millis(200)).unwrap();
        HttpReporter::send(reporter.client.clone(), reporter.url.clone(), sample()).await;
    }

    #[test]
    fn test_log_reporter_is_silent_sink() {
        LogReporter.report(sample());
    }
}
