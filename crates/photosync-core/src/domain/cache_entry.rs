//! Upload cache entries
//!
//! A [`CacheEntry`] records the last reconciliation outcome of one local file
//! against the remote drive. The `(size_bytes, mtime)` pair is the file
//! identity: a file whose size and mtime both match an `Uploaded` or
//! `Skipped` entry is not transferred again.

use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::newtypes::RelativePath;

/// Reconciliation state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryState {
    /// Transferred by PhotoSync and verified by size
    Uploaded,
    /// Already present remotely with a matching size, not transferred
    Skipped,
    /// Last attempt failed; never satisfies a skip check
    Failed,
}

impl EntryState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryState::Uploaded => "uploaded",
            EntryState::Skipped => "skipped",
            EntryState::Failed => "failed",
        }
    }

    /// Whether this state means the remote side holds the file
    #[must_use]
    pub fn is_reconciled(&self) -> bool {
        matches!(self, EntryState::Uploaded | EntryState::Skipped)
    }
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryState {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uploaded" => Ok(EntryState::Uploaded),
            "skipped" => Ok(EntryState::Skipped),
            "failed" => Ok(EntryState::Failed),
            other => Err(DomainError::InvalidState(other.to_string())),
        }
    }
}

/// One file known to the upload cache
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub relative_path: RelativePath,
    pub size_bytes: u64,
    /// Local modification time at the last recorded outcome
    pub mtime: DateTime<Utc>,
    /// Opaque remote item id (empty for failed entries)
    pub remote_id: String,
    pub state: EntryState,
}

impl CacheEntry {
    pub fn new(
        relative_path: RelativePath,
        size_bytes: u64,
        mtime: DateTime<Utc>,
        remote_id: impl Into<String>,
        state: EntryState,
    ) -> Self {
        Self {
            relative_path,
            size_bytes,
            mtime: truncate_to_micros(mtime),
            remote_id: remote_id.into(),
            state,
        }
    }

    /// True if the local file with this size and mtime needs no transfer
    #[must_use]
    pub fn matches(&self, size_bytes: u64, mtime: DateTime<Utc>) -> bool {
        self.state.is_reconciled()
            && self.size_bytes == size_bytes
            && self.mtime == truncate_to_micros(mtime)
    }
}

/// Convert a filesystem timestamp into the precision stored by the cache
pub fn normalize_mtime(time: SystemTime) -> DateTime<Utc> {
    truncate_to_micros(DateTime::<Utc>::from(time))
}

fn truncate_to_micros(dt: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(dt.timestamp_micros()).unwrap_or(dt)
}
