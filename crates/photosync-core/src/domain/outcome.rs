//! Per-file transfer outcomes and per-run results

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::newtypes::RelativePath;

/// Why a single file could not be reconciled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Network, timeout or throttling errors that outlasted the retry policy
    TransientNetwork,
    /// Quota exhausted, access denied or token rejected
    QuotaOrPermission,
    /// The local file could not be read or removed
    LocalIo,
    /// The remote item size differs from the local size after upload
    SizeMismatch,
    /// The target remote folder could not be resolved or created
    FolderResolution,
    /// Another local file maps to the same remote name
    NameCollision,
    /// The service refused the request for another reason
    RemoteRejected,
}

impl FailureKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::TransientNetwork => "transient_network",
            FailureKind::QuotaOrPermission => "quota_or_permission",
            FailureKind::LocalIo => "local_io",
            FailureKind::SizeMismatch => "size_mismatch",
            FailureKind::FolderResolution => "folder_resolution",
            FailureKind::NameCollision => "name_collision",
            FailureKind::RemoteRejected => "remote_rejected",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one attempt to reconcile a single file with the remote drive
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    /// The file was sent and the remote size verified
    Completed { remote_id: String, bytes_sent: u64 },
    /// The remote already held an item of the same size
    SkippedAlreadyExists { remote_id: String },
    Failed { kind: FailureKind, reason: String },
}

impl TransferOutcome {
    pub fn failed(kind: FailureKind, reason: impl Into<String>) -> Self {
        TransferOutcome::Failed {
            kind,
            reason: reason.into(),
        }
    }
}

/// A file that failed during a run, as reported to the operator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileFailure {
    pub relative_path: RelativePath,
    pub kind: FailureKind,
    pub reason: String,
}

/// Summary of one upload run for a profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub uploaded: u64,
    /// Files skipped by watermark, cache, or because the remote already had them
    pub skipped: u64,
    pub failed: u64,
    pub bytes_sent: u64,
    pub local_deleted: u64,
    pub failures: Vec<FileFailure>,
    /// High-water mtime after the run, if any
    pub watermark: Option<DateTime<Utc>>,
    /// The run stopped early because cancellation was requested
    pub cancelled: bool,
}

impl RunResult {
    pub fn record_failure(
        &mut self,
        relative_path: RelativePath,
        kind: FailureKind,
        reason: impl Into<String>,
    ) {
        self.failed += 1;
        self.failures.push(FileFailure {
            relative_path,
            kind,
            reason: reason.into(),
        });
    }

    /// Share of the run's files that failed, 0.0 for an empty run
    ///
    /// Skipped files count, so one stubborn file among many unchanged ones
    /// does not fail every incremental run.
    #[must_use]
    pub fn failure_ratio(&self) -> f64 {
        let processed = self.uploaded + self.skipped + self.failed;
        if processed == 0 {
            0.0
        } else {
            self.failed as f64 / processed as f64
        }
    }

    /// Whether the run should be reported as failed
    #[must_use]
    pub fn is_failure(&self, max_failure_ratio: f64) -> bool {
        self.failure_ratio() > max_failure_ratio
    }
}
