//! Structured logging and tracing configuration.
//!
//! Provides setup for observability using the `tracing` crate with:
//! - Plain text or JSON output
//! - Log file output for detached servers
//! - Configurable log levels

use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::{
    filter::EnvFilter, fmt, fmt::writer::BoxMakeWriter, layer::SubscriberExt,
    util::SubscriberInitExt, Registry,
};

use crate::{Config, Error, Result};

/// Tracing configuration options.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Enable JSON output format
    pub json: bool,
    /// Append to this file instead of writing to stderr
    pub log_file: Option<PathBuf>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            log_file: None,
        }
    }
}

impl TracingConfig {
    /// Derive tracing options from the application config.
    ///
    /// Release mode logs to the configured log file only.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            level: config.log_level.clone(),
            json: config.log_json,
            log_file: config.release.then(|| config.log_file()),
        }
    }
}

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` overrides the configured level when set.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global
/// subscriber is already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let (writer, ansi) = match &config.log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            (BoxMakeWriter::new(Mutex::new(file)), false)
        }
        None => (BoxMakeWriter::new(std::io::stderr), true),
    };

    let installed = if config.json {
        let json_layer = fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_writer(writer);

        Registry::default().with(env_filter).with(json_layer).try_init()
    } else {
        let fmt_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_ansi(ansi)
            .with_writer(writer);

        Registry::default().with(env_filter).with(fmt_layer).try_init()
    };
    installed.map_err(|e| Error::internal(format!("failed to initialize tracing: {e}")))?;

    tracing::debug!(
        level = %config.level,
        json = config.json,
        file = ?config.log_file,
        "Tracing initialized"
    );
    Ok(())
}

/// Span helpers for server work.
pub mod spans {
    use tracing::{info_span, Span};

    /// Span covering one client connection.
    #[must_use]
    pub fn connection_span(connection_id: &str, peer: &str) -> Span {
        info_span!(
            "connection",
            connection_id = %connection_id,
            peer = %peer,
        )
    }

    /// Span covering the dispatch of one command.
    #[must_use]
    pub fn command_span(command: &str) -> Span {
        info_span!("command", command = %command)
    }
}
