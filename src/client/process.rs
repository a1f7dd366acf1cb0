//! Starting, stopping and probing the server process.

use std::path::Path;
use std::process::{Command as ProcessCommand, Stdio};
use std::time::{Duration, Instant};

use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, Signal, System};

use super::Client;
use crate::error::RuntimeError;
use crate::protocol::ServerConfiguration;
use crate::runtime::read_pid;
use crate::{Config, Result};

/// How long `start_server` waits for the new process to answer a ping.
const START_TIMEOUT: Duration = Duration::from_secs(10);

/// Interval between liveness checks.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

fn refreshed(pid: Pid) -> System {
    let mut sys = System::new();
    sys.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing(),
    );
    sys
}

/// Whether a process with this id exists.
#[must_use]
pub fn process_exists(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    refreshed(pid).process(pid).is_some()
}

/// Whether the PID file names a live process.
#[must_use]
pub fn is_server_running(pid_file: &Path) -> bool {
    read_pid(pid_file).is_ok_and(process_exists)
}

/// Send SIGTERM to the server and wait for it to exit.
///
/// Returns the id of the signalled process.
///
/// # Errors
///
/// Returns an error if the server is not running or cannot be signalled.
pub async fn stop_server(pid_file: &Path, timeout: Duration) -> Result<u32> {
    let pid = read_pid(pid_file).map_err(|_| RuntimeError::NotRunning)?;
    let sys_pid = Pid::from_u32(pid);

    let sys = refreshed(sys_pid);
    let process = sys.process(sys_pid).ok_or(RuntimeError::NotRunning)?;
    // Signal::Term is unsupported on some platforms; fall back to kill.
    let delivered = process
        .kill_with(Signal::Term)
        .unwrap_or_else(|| process.kill());
    if !delivered {
        return Err(RuntimeError::SignalFailed { pid }.into());
    }
    tracing::debug!(pid, "Sent termination signal");

    let deadline = Instant::now() + timeout;
    while process_exists(pid) {
        if Instant::now() >= deadline {
            tracing::warn!(pid, "Server still running after termination signal");
            break;
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }

    Ok(pid)
}

/// Spawn a detached release-mode server and wait until it answers.
///
/// The child gets the same configuration as this process.
///
/// # Errors
///
/// Returns an error if the executable cannot be spawned or the server
/// does not answer a ping within the startup deadline.
pub async fn start_server(config: &Config) -> Result<ServerConfiguration> {
    let exe = std::env::current_exe()?;
    let mut cmd = ProcessCommand::new(exe);
    cmd.args(server_args(config))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let child = cmd.spawn()?;
    tracing::debug!(pid = child.id(), "Server process spawned");

    let client = Client::from_config(config);
    let deadline = Instant::now() + START_TIMEOUT;
    loop {
        match client.ping().await {
            Ok(configuration) => return Ok(configuration),
            Err(e) if Instant::now() >= deadline => {
                tracing::debug!(error = %e, "Server did not answer");
                return Err(RuntimeError::StartTimeout(START_TIMEOUT).into());
            }
            Err(_) => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }
}

/// Command line for a child `serve --release` process.
fn server_args(config: &Config) -> Vec<String> {
    let mut args = vec![
        "--runtime-dir".to_string(),
        config.runtime_dir.display().to_string(),
        "--host".to_string(),
        config.host.clone(),
        "--port".to_string(),
        config.port.to_string(),
        "--log-level".to_string(),
        config.log_level.clone(),
        "--debounce-ms".to_string(),
        config.debounce.as_millis().to_string(),
        "--io-timeout-secs".to_string(),
        config.io_timeout.as_secs().to_string(),
        "--shutdown-timeout-secs".to_string(),
        config.shutdown_timeout.as_secs().to_string(),
    ];
    if !config.use_unix_socket {
        args.push("--no-unix-socket".to_string());
    }
    if config.log_json {
        args.push("--log-json".to_string());
    }
    match &config.collector_url {
        Some(url) => {
            args.push("--collector-url".to_string());
            args.push(url.clone());
        }
        None => args.push("--no-collector".to_string()),
    }
    args.push("serve".to_string());
    args.push("--release".to_string());
    args
}
