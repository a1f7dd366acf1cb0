//! File Tracker - file tracking daemon and its command line client.
//!
//! Entry point for both the server (`serve`) and the client commands.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use file_tracker::client::{
    format_add, format_configuration, format_list, format_remove, is_server_running,
    start_server, stop_server, Client,
};
use file_tracker::config::DEFAULT_COLLECTOR_URL;
use file_tracker::protocol::TrackedFile;
use file_tracker::server::{init_tracing, App, TracingConfig};
use file_tracker::watcher::{HttpReporter, LogReporter, ManagerConfig, MetadataReporter, WatchManager};
use file_tracker::Config;

/// File Tracker - watch files and report their metadata
#[derive(Parser, Debug)]
#[command(name = "file-tracker")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory for the PID file, socket and log file
    #[arg(long, env = "FILE_TRACKER_RUNTIME_DIR", default_value = "./var", global = true)]
    runtime_dir: PathBuf,

    /// Host address for the TCP transport
    #[arg(long, env = "FILE_TRACKER_HOST", default_value = "127.0.0.1", global = true)]
    host: String,

    /// Port for the TCP transport
    #[arg(short, long, env = "FILE_TRACKER_PORT", default_value = "9998", global = true)]
    port: u16,

    /// Use TCP even where Unix sockets are available
    #[arg(long, env = "FILE_TRACKER_NO_UNIX_SOCKET", global = true)]
    no_unix_socket: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FILE_TRACKER_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    /// Enable JSON logging output
    #[arg(long, env = "FILE_TRACKER_LOG_JSON", global = true)]
    log_json: bool,

    /// Endpoint receiving file metadata
    #[arg(
        long,
        env = "FILE_TRACKER_COLLECTOR_URL",
        default_value = DEFAULT_COLLECTOR_URL,
        global = true
    )]
    collector_url: String,

    /// Log metadata instead of sending it to a collector
    #[arg(long, env = "FILE_TRACKER_NO_COLLECTOR", global = true)]
    no_collector: bool,

    /// Quiet period for file events in milliseconds
    #[arg(long, env = "FILE_TRACKER_DEBOUNCE_MS", default_value = "500", global = true)]
    debounce_ms: u64,

    /// Timeout for each client exchange step in seconds
    #[arg(long, env = "FILE_TRACKER_IO_TIMEOUT_SECS", default_value = "30", global = true)]
    io_timeout_secs: u64,

    /// Time allowed for in-flight connections on shutdown in seconds
    #[arg(
        long,
        env = "FILE_TRACKER_SHUTDOWN_TIMEOUT_SECS",
        default_value = "10",
        global = true
    )]
    shutdown_timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the server in the foreground
    Serve {
        /// Log to the runtime log file only
        #[arg(long)]
        release: bool,
    },
    /// Start the server in the background
    Start,
    /// Stop the running server
    Stop,
    /// Show the server status and configuration
    #[command(alias = "ping")]
    Status,
    /// Add files to tracking
    Add {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Dataset id attached to the file's metadata (single path only)
        #[arg(long)]
        id: Option<i64>,
    },
    /// Remove files from tracking
    Remove {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List tracked files
    List,
}

impl Cli {
    fn config(&self) -> Config {
        Config {
            runtime_dir: self.runtime_dir.clone(),
            host: self.host.clone(),
            port: self.port,
            use_unix_socket: cfg!(unix) && !self.no_unix_socket,
            release: matches!(self.command, Commands::Serve { release: true }),
            log_level: self.log_level.clone(),
            log_json: self.log_json,
            collector_url: (!self.no_collector).then(|| self.collector_url.clone()),
            debounce: Duration::from_millis(self.debounce_ms),
            io_timeout: Duration::from_secs(self.io_timeout_secs),
            shutdown_timeout: Duration::from_secs(self.shutdown_timeout_secs),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = cli.config();
    config.validate()?;

    init_tracing(&TracingConfig::from_config(&config))?;
    tracing::debug!(?config, "Configuration loaded");

    match cli.command {
        Commands::Serve { .. } => serve(config).await,
        Commands::Start => start(&config).await,
        Commands::Stop => stop(&config).await,
        Commands::Status => status(&config).await,
        Commands::Add { paths, id } => add(&config, paths, id).await,
        Commands::Remove { paths } => remove(&config, paths).await,
        Commands::List => list(&config).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "File tracker v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    if is_server_running(&config.pid_file()) {
        bail!(
            "server is already running (PID file {})",
            config.pid_file().display()
        );
    }

    let reporter: Arc<dyn MetadataReporter> = match &config.collector_url {
        Some(url) => {
            tracing::info!(%url, "Reporting metadata to collector");
            Arc::new(HttpReporter::new(url.clone(), config.io_timeout)?)
        }
        None => Arc::new(LogReporter),
    };

    let manager = WatchManager::start(
        ManagerConfig {
            debounce: config.debounce,
        },
        reporter,
    );

    App::new(config, manager)?.run().await?;
    Ok(())
}

async fn start(config: &Config) -> anyhow::Result<()> {
    if is_server_running(&config.pid_file()) {
        let configuration = Client::discover(config).ping().await?;
        println!("Server is already working with configuration:");
        println!("{}", format_configuration(&configuration));
        return Ok(());
    }

    let configuration = start_server(config)
        .await
        .context("failed to start server")?;
    println!("Server started with configuration:");
    println!("{}", format_configuration(&configuration));
    Ok(())
}

async fn stop(config: &Config) -> anyhow::Result<()> {
    if !is_server_running(&config.pid_file()) {
        println!("Server is not running");
        return Ok(());
    }

    let wait = config.shutdown_timeout + Duration::from_secs(1);
    let pid = stop_server(&config.pid_file(), wait).await?;
    tracing::debug!(pid, "Server signalled");
    println!("Server stopped");
    Ok(())
}

async fn status(config: &Config) -> anyhow::Result<()> {
    if !is_server_running(&config.pid_file()) {
        println!("Server is not running");
        return Ok(());
    }

    let configuration = Client::discover(config).ping().await?;
    println!("Server is working with configuration:");
    println!("{}", format_configuration(&configuration));
    Ok(())
}

async fn add(config: &Config, paths: Vec<PathBuf>, id: Option<i64>) -> anyhow::Result<()> {
    if id.is_some() && paths.len() != 1 {
        bail!("--id can only be used with a single path");
    }
    if !is_server_running(&config.pid_file()) {
        println!("Server is not running");
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let files = paths
        .into_iter()
        .map(|path| {
            let file = TrackedFile::new(absolute(&cwd, path));
            match id {
                Some(id) => file.with_id(id),
                None => file,
            }
        })
        .collect();

    let results = Client::discover(config).add(files).await?;
    println!("{}", format_add(&results));
    Ok(())
}

async fn remove(config: &Config, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    if !is_server_running(&config.pid_file()) {
        println!("Server is not running");
        return Ok(());
    }

    let cwd = std::env::current_dir()?;
    let paths = paths.into_iter().map(|path| absolute(&cwd, path)).collect();

    let results = Client::discover(config).remove(paths).await?;
    println!("{}", format_remove(&results));
    Ok(())
}

async fn list(config: &Config) -> anyhow::Result<()> {
    if !is_server_running(&config.pid_file()) {
        println!("Server is not running");
        return Ok(());
    }

    let files = Client::discover(config).list().await?;
    println!("{}", format_list(&files));
    Ok(())
}

/// Join a relative path onto `cwd`, dropping `.` components.
///
/// `..` is kept as written; symlinks are not resolved.
fn absolute(cwd: &Path, path: PathBuf) -> PathBuf {
    let joined = if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    };
    joined.components().collect()
}
