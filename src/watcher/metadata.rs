//! Metadata snapshot sent to the collector when a tracked file changes.

use std::fs;
use std::io;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::protocol::TrackedFile;

static HOSTNAME: Lazy<String> = Lazy::new(|| {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "unknown".to_string())
});

/// Usage metadata for one tracked file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub hostname: String,
    pub file_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_general_info_id: Option<i64>,
    /// Inode change time (creation time where ctime is unavailable).
    #[serde(with = "iso8601_millis")]
    pub age: DateTime<Utc>,
    /// Three-digit octal permission bits, e.g. `644`.
    pub access_rights: String,
    #[serde(with = "iso8601_millis")]
    pub last_access_date: DateTime<Utc>,
    #[serde(with = "iso8601_millis")]
    pub last_modification_date: DateTime<Utc>,
    pub size: u64,
}

impl FileMetadata {
    /// Stat a tracked file and build its snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be stat'ed.
    pub fn capture(file: &TrackedFile) -> io::Result<Self> {
        let meta = fs::metadata(&file.file_path)?;

        Ok(Self {
            hostname: HOSTNAME.clone(),
            file_path: file.file_path.clone(),
            dataset_general_info_id: file.id,
            age: change_time(&meta)?,
            access_rights: access_rights(&meta),
            last_access_date: meta.accessed()?.into(),
            last_modification_date: meta.modified()?.into(),
            size: meta.len(),
        })
    }
}

#[cfg(unix)]
fn change_time(meta: &fs::Metadata) -> io::Result<DateTime<Utc>> {
    use std::os::unix::fs::MetadataExt;

    let nanos = u32::try_from(meta.ctime_nsec()).unwrap_or(0);
    DateTime::from_timestamp(meta.ctime(), nanos)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "ctime out of range"))
}

#[cfg(not(unix))]
fn change_time(meta: &fs::Metadata) -> io::Result<DateTime<Utc>> {
    Ok(meta.created()?.into())
}

#[cfg(unix)]
fn access_rights(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;

    format!("{:03o}", meta.permissions().mode() & 0o777)
}

#[cfg(not(unix))]
fn access_rights(meta: &fs::Metadata) -> String {
    if meta.permissions().readonly() {
        "444".to_string()
    } else {
        "666".to_string()
    }
}

/// UTC timestamps as `2024-01-31T12:00:00.123Z`.
mod iso8601_millis {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
