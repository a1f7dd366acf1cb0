//! Configuration settings and validation.

use std::path::PathBuf;
use std::time::Duration;

use crate::protocol::Transport;
use crate::{Error, Result};

/// Default collector endpoint for metadata events.
pub const DEFAULT_COLLECTOR_URL: &str = "http://127.0.0.1:8000/client/add_event";

/// Main configuration shared by the server and the client.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the PID file, socket and log file.
    pub runtime_dir: PathBuf,

    /// Host address for the TCP transport.
    pub host: String,

    /// Port for the TCP transport.
    pub port: u16,

    /// Use a Unix domain socket instead of TCP.
    pub use_unix_socket: bool,

    /// Release mode: log to file only.
    pub release: bool,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines.
    pub log_json: bool,

    /// Collector endpoint; `None` disables reporting.
    pub collector_url: Option<String>,

    /// Quiet period before a burst of file events is reported.
    pub debounce: Duration,

    /// Bound on each read/write of a client exchange.
    pub io_timeout: Duration,

    /// How long shutdown waits for in-flight connections.
    pub shutdown_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runtime_dir: PathBuf::from("./var"),
            host: "127.0.0.1".to_string(),
            port: 9998,
            use_unix_socket: cfg!(unix),
            release: false,
            log_level: "info".to_string(),
            log_json: false,
            collector_url: Some(DEFAULT_COLLECTOR_URL.to_string()),
            debounce: Duration::from_millis(500),
            io_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(Error::config("port cannot be 0"));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.host.is_empty() {
            return Err(Error::config("host cannot be empty"));
        }

        if self.use_unix_socket && !cfg!(unix) {
            return Err(Error::config(
                "unix sockets are not available on this platform",
            ));
        }

        if self.io_timeout.is_zero() {
            return Err(Error::config("io_timeout cannot be 0"));
        }

        if self.debounce.is_zero() {
            return Err(Error::config("debounce cannot be 0"));
        }

        if let Some(url) = &self.collector_url {
            reqwest::Url::parse(url)
                .map_err(|e| Error::config(format!("invalid collector url '{url}': {e}")))?;
        }

        Ok(())
    }

    /// Path of the PID marker file.
    #[must_use]
    pub fn pid_file(&self) -> PathBuf {
        self.runtime_dir.join("file-tracker.pid")
    }

    /// Path of the Unix domain socket.
    #[must_use]
    pub fn socket_path(&self) -> PathBuf {
        self.runtime_dir.join("file-tracker.sock")
    }

    /// Path of the release-mode log file.
    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.runtime_dir.join("file-tracker.log")
    }

    /// Path of the marker recording the running server's transport.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.runtime_dir.join("file-tracker.state.json")
    }

    /// Transport selected by this configuration.
    #[must_use]
    pub fn transport(&self) -> Transport {
        if self.use_unix_socket {
            Transport::Unix {
                socket_path: self.socket_path(),
            }
        } else {
            Transport::Tcp {
                host: self.host.clone(),
                port: self.port,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.port, 9998);
        assert_eq!(config.host, "127.0.0.1");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_new() {
        let config = Config::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_invalid_port() {
        let config = Config {
            port: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("port"));
    }

    #[test]
    fn test_validate_invalid_log_level() {
        let config = Config {
            log_level: "invalid".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("log level"));
    }

    #[test]
    fn test_validate_empty_host() {
        let config = Config {
            host: String::new(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("host"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = Config {
            io_timeout: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("io_timeout"));
    }

    #[test]
    fn test_validate_bad_collector_url() {
        let config = Config {
            collector_url: Some("not a url".to_string()),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("collector url"));
    }

    #[test]
    fn test_collector_disabled_is_valid() {
        let config = Config {
            collector_url: None,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_runtime_paths() {
        let config = Config {
            runtime_dir: PathBuf::from("/var/run/ft"),
            ..Default::default()
        };
        assert_eq!(config.pid_file(), PathBuf::from("/var/run/ft/file-tracker.pid"));
        assert_eq!(
            config.socket_path(),
            PathBuf::from("/var/run/ft/file-tracker.sock")
        );
        assert_eq!(config.log_file(), PathBuf::from("/var/run/ft/file-tracker.log"));
        assert_eq!(
            config.state_file(),
            PathBuf::from("/var/run/ft/file-tracker.state.json")
        );
    }

    #[test]
    fn test_tcp_transport() {
        let config = Config {
            host: "0.0.0.0".to_string(),
            port: 9090,
            use_unix_socket: false,
            ..Default::default()
        };
        assert_eq!(
            config.transport(),
            Transport::Tcp {
                host: "0.0.0.0".to_string(),
                port: 9090
            }
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_unix_transport() {
        let config = Config {
            runtime_dir: PathBuf::from("/tmp/ft"),
            use_unix_socket: true,
            ..Default::default()
        };
        assert_eq!(
            config.transport(),
            Transport::Unix {
                socket_path: PathBuf::from("/tmp/ft/file-tracker.sock")
            }
        );
    }

    #[test]
    fn test_log_level_case_insensitive() {
        for level in ["TRACE", "Debug", "INFO", "Warn", "ERROR"] {
            let config = Config {
                log_level: level.to_string(),
                ..Default::default()
            };
            assert!(
                config.validate().is_ok(),
                "Level '{level}' should be valid (case insensitive)"
            );
        }
    }
}
