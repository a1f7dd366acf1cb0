//! Runtime marker files: the PID file, the transport marker and the Unix
//! socket path.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::RuntimeError;
use crate::protocol::{decode, encode, Transport};
use crate::{Config, Result};

/// Marker files owned by a running server.
#[derive(Debug)]
pub struct RuntimeFiles {
    pid_file: PathBuf,
    state_file: PathBuf,
    socket_path: Option<PathBuf>,
}

impl RuntimeFiles {
    /// Clear stale markers, then write the PID file for `pid` and the
    /// transport marker clients use to find this server.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime directory or PID file cannot be
    /// written.
    pub fn create(config: &Config, pid: u32) -> Result<Self> {
        fs::create_dir_all(&config.runtime_dir)?;

        let files = Self {
            pid_file: config.pid_file(),
            state_file: config.state_file(),
            socket_path: config.use_unix_socket.then(|| config.socket_path()),
        };
        files.clear();

        fs::write(&files.pid_file, format!("{pid}\n"))?;
        tracing::debug!(pid, path = %files.pid_file.display(), "PID file written");

        fs::write(&files.state_file, encode(&config.transport())?)?;

        Ok(files)
    }

    #[must_use]
    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Remove every marker file that exists.
    pub fn clear(&self) {
        remove_if_exists(&self.pid_file);
        remove_if_exists(&self.state_file);
        if let Some(socket) = &self.socket_path {
            remove_if_exists(socket);
        }
    }
}

fn remove_if_exists(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed runtime file"),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "Failed to remove runtime file"),
    }
}

/// Read the process id from a PID file.
///
/// # Errors
///
/// Returns an error if the file is missing or does not hold a number.
pub fn read_pid(path: &Path) -> Result<u32> {
    let invalid = |reason: String| RuntimeError::InvalidPidFile {
        path: path.display().to_string(),
        reason,
    };

    let contents = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let pid = contents
        .trim()
        .parse::<u32>()
        .map_err(|e| invalid(e.to_string()))?;
    Ok(pid)
}

/// Transport recorded by a running server, if any.
///
/// A missing or unreadable marker yields `None`.
#[must_use]
pub fn read_transport(path: &Path) -> Option<Transport> {
    let data = fs::read(path).ok()?;
    match decode(&data) {
        Ok(transport) => Some(transport),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable transport marker");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> Config {
        Config {
            runtime_dir: dir.join("var"),
            use_unix_socket: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_writes_pid() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());

        let files = RuntimeFiles::create(&config, 1234).unwrap();
        assert_eq!(files.pid_file(), config.pid_file());
        assert_eq!(read_pid(&config.pid_file()).unwrap(), 1234);
    }

    #[test]
    fn test_create_records_transport() {
        let tmp = TempDir::new().unwrap();
        let config = Config {
            use_unix_socket: false,
            port: 9100,
            ..config_in(tmp.path())
        };

        let files = RuntimeFiles::create(&config, 1).unwrap();
        assert_eq!(
            read_transport(&config.state_file()),
            Some(Transport::Tcp {
                host: "127.0.0.1".to_string(),
                port: 9100
            })
        );

        files.clear();
        assert_eq!(read_transport(&config.state_file()), None);
    }

    #[test]
    fn test_read_transport_ignores_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file-tracker.state.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(read_transport(&path), None);
    }

    #[test]
    fn test_create_replaces_stale_files() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());
        fs::create_dir_all(&config.runtime_dir).unwrap();
        fs::write(config.pid_file(), "999\n").unwrap();
        fs::write(config.socket_path(), "").unwrap();

        let _files = RuntimeFiles::create(&config, 1).unwrap();
        assert_eq!(read_pid(&config.pid_file()).unwrap(), 1);
        assert!(!config.socket_path().exists());
    }

    #[test]
    fn test_clear_removes_markers() {
        let tmp = TempDir::new().unwrap();
        let config = config_in(tmp.path());

        let files = RuntimeFiles::create(&config, 42).unwrap();
        fs::write(config.socket_path(), "").unwrap();

        files.clear();
        assert!(!config.pid_file().exists());
        assert!(!config.state_file().exists());
        assert!(!config.socket_path().exists());

        // Clearing twice is harmless.
        files.clear();
    }

    #[test]
    fn test_read_pid_rejects_garbage() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.pid");
        fs::write(&path, "not-a-pid").unwrap();

        let err = read_pid(&path).unwrap_err();
        assert!(matches!(
            err,
            Error::Runtime(RuntimeError::InvalidPidFile { .. })
        ));
    }

    #[test]
    fn test_read_pid_missing_file() {
        let err = read_pid(Path::new("/nonexistent/file-tracker.pid")).unwrap_err();
        assert!(err.to_string().contains("invalid PID file"));
    }
}
