//! Local tree enumeration
//!
//! Walks the source folder with `walkdir` on the blocking pool and returns
//! every regular file accepted by the profile's [`PathMatcher`], with its size
//! and microsecond-truncated mtime. Symlinks are not followed. Unreadable
//! entries are reported individually and do not stop the walk.
//!
//! ## Watermark pruning
//!
//! A directory's mtime changes whenever an entry is created, removed or
//! renamed in it. When a cutoff is given, files whose parent directory has
//! an mtime at or below the cutoff are counted as pruned and never
//! stat-read. Subdirectories are still visited, since a change deep in the
//! tree does not touch the mtime of its ancestors.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use photosync_core::domain::{normalize_mtime, RelativePath};

use crate::matcher::PathMatcher;
use crate::SyncError;

/// A regular file found under the source folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedFile {
    pub relative_path: RelativePath,
    pub absolute_path: PathBuf,
    pub size_bytes: u64,
    pub mtime: DateTime<Utc>,
    /// Mtime of the containing directory, if it could be read
    pub dir_mtime: Option<DateTime<Utc>>,
}

impl ScannedFile {
    /// Highest watermark that still lets the next scan see this file
    ///
    /// Below both the file's own mtime and its directory's, so a file that
    /// was not committed keeps its directory out of pruning.
    pub fn visibility_floor(&self) -> DateTime<Utc> {
        self.dir_mtime.map_or(self.mtime, |dir| dir.min(self.mtime))
    }
}

/// An entry that could not be read
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFailure {
    pub relative_path: RelativePath,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct ScanReport {
    pub files: Vec<ScannedFile>,
    pub failures: Vec<ScanFailure>,
    /// Matching files skipped without a stat because their directory is
    /// older than the cutoff
    pub pruned: u64,
}

/// Enumerates the files of `root` accepted by `matcher`
///
/// With `prune_at`, files in directories not modified after it are counted
/// in [`ScanReport::pruned`] instead of being read.
///
/// # Errors
/// Fails only if `root` itself cannot be read
pub async fn scan(
    root: &Path,
    matcher: &PathMatcher,
    prune_at: Option<DateTime<Utc>>,
) -> Result<ScanReport, SyncError> {
    let root = root.to_path_buf();
    let matcher = matcher.clone();
    tokio::task::spawn_blocking(move || scan_blocking(&root, &matcher, prune_at))
        .await
        .map_err(|e| SyncError::Io(std::io::Error::other(e)))?
}

fn modified(entry: &DirEntry) -> Option<DateTime<Utc>> {
    entry
        .metadata()
        .ok()
        .and_then(|m| m.modified().ok())
        .map(normalize_mtime)
}

fn scan_blocking(
    root: &Path,
    matcher: &PathMatcher,
    prune_at: Option<DateTime<Utc>>,
) -> Result<ScanReport, SyncError> {
    let mut report = ScanReport::default();
    // Mtimes of the directories on the current walk path, by depth
    let mut dir_mtimes: Vec<Option<DateTime<Utc>>> = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let relative = err
                    .path()
                    .and_then(|p| RelativePath::from_paths(root, p).ok());
                match relative {
                    Some(relative_path) => {
                        warn!(path = %relative_path, error = %err, "Cannot read entry");
                        report.failures.push(ScanFailure {
                            relative_path,
                            reason: err.to_string(),
                        });
                    }
                    None if err.depth() == 0 => {
                        return Err(SyncError::Io(std::io::Error::other(err.to_string())));
                    }
                    None => warn!(error = %err, "Skipping unreadable entry"),
                }
                continue;
            }
        };

        if entry.file_type().is_dir() {
            dir_mtimes.truncate(entry.depth());
            dir_mtimes.push(modified(&entry));
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }

        let relative_path = match RelativePath::from_paths(root, entry.path()) {
            Ok(p) => p,
            Err(err) => {
                warn!(path = ?entry.path(), %err, "Skipping invalid path");
                continue;
            }
        };
        if !matcher.matches(&relative_path) {
            continue;
        }

        let dir_mtime = entry
            .depth()
            .checked_sub(1)
            .and_then(|depth| dir_mtimes.get(depth).copied().flatten());
        if let (Some(cutoff), Some(dir)) = (prune_at, dir_mtime) {
            if dir <= cutoff {
                report.pruned += 1;
                continue;
            }
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %relative_path, error = %err, "Cannot stat file");
                report.failures.push(ScanFailure {
                    relative_path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        let mtime = match metadata.modified() {
            Ok(t) => normalize_mtime(t),
            Err(err) => {
                report.failures.push(ScanFailure {
                    relative_path,
                    reason: err.to_string(),
                });
                continue;
            }
        };

        report.files.push(ScannedFile {
            relative_path,
            absolute_path: entry.into_path(),
            size_bytes: metadata.len(),
            mtime,
            dir_mtime,
        });
    }

    debug!(
        root = %root.display(),
        files = report.files.len(),
        pruned = report.pruned,
        failures = report.failures.len(),
        "Scan complete"
    );
    Ok(report)
}
