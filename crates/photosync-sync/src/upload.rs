//! Incremental upload orchestrator
//!
//! [`UploadSyncOrchestrator::run_upload_sync`] reconciles one profile's
//! source folder with its remote folder:
//!
//! 1. **Preflight**: source folder exists, remote root resolvable
//! 2. **Scan**: enumerate local files matching the patterns, pruning
//!    directories older than the watermark, then settle name collisions
//! 3. **Filter**: skip files under the watermark, then files the cache
//!    already knows with the same size and mtime
//! 4. **Transfer**: upload the rest in `(mtime, path)` order
//! 5. **Bookkeeping**: flush the cache, then advance the watermark
//!
//! Files are processed one at a time. Per-file failures are recorded and the
//! run continues; cancellation is honored between files.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use photosync_core::config::{Config, UploadProfile};
use photosync_core::domain::{CacheEntry, EntryState, FailureKind, RunResult, TransferOutcome};
use photosync_core::ports::{IDriveClient, IUploadCache, IWatermarkStore};
use photosync_core::retry::RetryPolicy;

use crate::matcher::PathMatcher;
use crate::resolver::RemoteFolderResolver;
use crate::scanner::{self, ScannedFile};
use crate::transfer::{TransferEngine, TransferRequest};
use crate::SyncError;

// ============================================================================
// Settings
// ============================================================================

/// Engine settings shared by every profile
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncSettings {
    pub retry: RetryPolicy,
    pub chunk_size: usize,
    pub max_failure_ratio: f64,
}

impl SyncSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            retry: config.retry_policy(),
            chunk_size: config.chunk_size_bytes(),
            max_failure_ratio: config.transfer.max_failure_ratio,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            chunk_size: 10 * 1024 * 1024,
            max_failure_ratio: 0.5,
        }
    }
}

// ============================================================================
// Watermark bookkeeping
// ============================================================================

/// Tracks which mtimes are safe to put under the next watermark
///
/// The new high-water mark is the largest committed mtime strictly below
/// the lowest [`ScannedFile::visibility_floor`] of the files that were not
/// committed (failed, collided, or left unprocessed by cancellation).
#[derive(Debug, Default)]
pub(crate) struct WatermarkTracker {
    committed: Vec<DateTime<Utc>>,
    blocker: Option<DateTime<Utc>>,
    /// Set when some file's mtime is unknown
    poisoned: bool,
}

impl WatermarkTracker {
    pub(crate) fn commit(&mut self, mtime: DateTime<Utc>) {
        self.committed.push(mtime);
    }

    pub(crate) fn block(&mut self, mtime: DateTime<Utc>) {
        self.blocker = Some(self.blocker.map_or(mtime, |b| b.min(mtime)));
    }

    pub(crate) fn poison(&mut self) {
        self.poisoned = true;
    }

    pub(crate) fn high_water(&self) -> Option<DateTime<Utc>> {
        if self.poisoned {
            return None;
        }
        self.committed
            .iter()
            .copied()
            .filter(|t| self.blocker.map_or(true, |b| *t < b))
            .max()
    }
}

// ============================================================================
// Collisions
// ============================================================================

/// Remote location a file maps to, lowercased as OneDrive compares names
fn remote_key(file: &ScannedFile, preserve_structure: bool) -> String {
    if preserve_structure {
        file.relative_path.as_str().to_lowercase()
    } else {
        file.relative_path.file_name().to_lowercase()
    }
}

/// Splits files into upload candidates and collision losers
///
/// Files collide when they map to the same remote item. That happens to
/// equal file names when the structure is flattened, and to paths that only
/// differ in case otherwise. The newest mtime wins; ties go to the greatest
/// relative path.
fn settle_collisions(
    files: Vec<ScannedFile>,
    preserve_structure: bool,
) -> (Vec<ScannedFile>, Vec<(ScannedFile, ScannedFile)>) {
    let mut by_key: HashMap<String, Vec<ScannedFile>> = HashMap::new();
    for file in files {
        by_key
            .entry(remote_key(&file, preserve_structure))
            .or_default()
            .push(file);
    }

    let mut winners = Vec::new();
    let mut losers = Vec::new();
    for (_, mut group) in by_key {
        group.sort_by(|a, b| {
            (a.mtime, &a.relative_path).cmp(&(b.mtime, &b.relative_path))
        });
        let Some(winner) = group.pop() else { continue };
        for loser in group {
            losers.push((loser, winner.clone()));
        }
        winners.push(winner);
    }
    (winners, losers)
}

// ============================================================================
// Orchestrator
// ============================================================================

/// Runs incremental uploads against one drive client
pub struct UploadSyncOrchestrator {
    drive: Arc<dyn IDriveClient>,
    settings: SyncSettings,
}

impl UploadSyncOrchestrator {
    pub fn new(drive: Arc<dyn IDriveClient>, settings: SyncSettings) -> Self {
        Self { drive, settings }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    /// Uploads every new or changed file of `profile`
    ///
    /// # Errors
    /// Run-level failures only: missing source folder, unreachable remote
    /// root, invalid profile settings, or a failing state store.
    pub async fn run_upload_sync(
        &self,
        profile: &UploadProfile,
        cache: &mut dyn IUploadCache,
        watermarks: &dyn IWatermarkStore,
        cancel: &CancellationToken,
    ) -> Result<RunResult, SyncError> {
        let run_id = Uuid::new_v4();
        let scan_time = Utc::now();
        info!(profile = %profile.name, %run_id, source = %profile.source_folder.display(), "Starting upload run");

        // ---- Preflight ----
        if !profile.source_folder.is_dir() {
            return Err(SyncError::SourceMissing(profile.source_folder.clone()));
        }
        let matcher = PathMatcher::new(&profile.file_patterns)
            .map_err(|e| SyncError::InvalidProfile(format!("bad file pattern: {e}")))?;
        let remote_root = profile
            .remote_root()
            .map_err(|e| SyncError::InvalidProfile(e.to_string()))?;

        let mut resolver = RemoteFolderResolver::new(
            Arc::clone(&self.drive),
            remote_root,
            profile.preserve_structure,
            self.settings.retry,
        );
        resolver
            .resolve_root()
            .await
            .map_err(SyncError::RemoteUnavailable)?;

        // ---- Watermark ----
        let watermark = if !profile.use_watermark {
            None
        } else if cache.recovered_from_corruption() {
            warn!(profile = %profile.name, "Cache was rebuilt, ignoring watermark for this run");
            None
        } else {
            watermarks
                .get(&profile.name)
                .await
                .map_err(SyncError::Store)?
        };
        if let Some(wm) = &watermark {
            debug!(profile = %profile.name, high_water = %wm.high_water_mtime, "Using watermark");
        }

        // ---- Scan ----
        let mut result = RunResult::default();
        let mut tracker = WatermarkTracker::default();

        let report = scanner::scan(
            &profile.source_folder,
            &matcher,
            watermark.as_ref().map(|wm| wm.high_water_mtime),
        )
        .await?;
        for failure in report.failures {
            tracker.poison();
            result.record_failure(failure.relative_path, FailureKind::LocalIo, failure.reason);
        }
        let pruned = report.pruned;
        result.skipped += pruned;
        let scanned = report.files.len();

        let (mut candidates, losers) = settle_collisions(report.files, profile.preserve_structure);
        for (loser, winner) in losers {
            let reason = format!(
                "remote name '{}' is taken by newer '{}'",
                loser.relative_path.file_name(),
                winner.relative_path
            );
            warn!(path = %loser.relative_path, %reason, "Name collision");
            tracker.block(loser.visibility_floor());
            if profile.use_cache {
                record(cache, &loser, String::new(), EntryState::Failed).await?;
            }
            result.record_failure(loser.relative_path, FailureKind::NameCollision, reason);
        }
        candidates.sort_by(|a, b| (a.mtime, &a.relative_path).cmp(&(b.mtime, &b.relative_path)));

        // ---- Transfer ----
        let engine = TransferEngine::new(
            Arc::clone(&self.drive),
            self.settings.retry,
            self.settings.chunk_size,
        );

        for (index, file) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(profile = %profile.name, "Cancellation requested, stopping run");
                result.cancelled = true;
                for unprocessed in &candidates[index..] {
                    tracker.block(unprocessed.visibility_floor());
                }
                break;
            }

            if watermark.as_ref().is_some_and(|wm| wm.covers(file.mtime)) {
                result.skipped += 1;
                tracker.commit(file.mtime);
                continue;
            }

            if profile.use_cache {
                if let Some(entry) = cache.lookup(&file.relative_path) {
                    if entry.matches(file.size_bytes, file.mtime) {
                        debug!(path = %file.relative_path, "Already uploaded");
                        result.skipped += 1;
                        tracker.commit(file.mtime);
                        continue;
                    }
                }
            }

            let outcome = match resolver.resolve(file.relative_path.parent_dir()).await {
                Ok(folder_id) => {
                    engine
                        .upload(
                            TransferRequest {
                                local_path: &file.absolute_path,
                                size_bytes: file.size_bytes,
                                folder_id: &folder_id,
                                remote_name: file.relative_path.file_name(),
                            },
                            profile.on_remote_conflict,
                        )
                        .await
                }
                Err(e) => TransferOutcome::failed(FailureKind::FolderResolution, e.to_string()),
            };

            self.apply_outcome(profile, cache, &engine, file, outcome, &mut result, &mut tracker)
                .await?;
        }

        // ---- Bookkeeping ----
        cache.flush().await.map_err(SyncError::Store)?;

        if profile.use_watermark {
            let record = watermarks
                .advance(&profile.name, tracker.high_water(), scan_time)
                .await
                .map_err(SyncError::Store)?;
            result.watermark = record.map(|r| r.high_water_mtime);
        }

        info!(
            profile = %profile.name,
            %run_id,
            scanned,
            pruned,
            uploaded = result.uploaded,
            skipped = result.skipped,
            failed = result.failed,
            bytes_sent = result.bytes_sent,
            local_deleted = result.local_deleted,
            cancelled = result.cancelled,
            "Upload run finished"
        );
        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_outcome(
        &self,
        profile: &UploadProfile,
        cache: &mut dyn IUploadCache,
        engine: &TransferEngine,
        file: &ScannedFile,
        outcome: TransferOutcome,
        result: &mut RunResult,
        tracker: &mut WatermarkTracker,
    ) -> Result<(), SyncError> {
        match outcome {
            TransferOutcome::Completed {
                remote_id,
                bytes_sent,
            } => {
                info!(path = %file.relative_path, bytes = bytes_sent, "Uploaded");
                result.uploaded += 1;
                result.bytes_sent += bytes_sent;
                tracker.commit(file.mtime);
                if profile.use_cache {
                    record(cache, file, remote_id, EntryState::Uploaded).await?;
                }
            }
            TransferOutcome::SkippedAlreadyExists { remote_id } => {
                info!(path = %file.relative_path, "Already present remotely");
                result.skipped += 1;
                tracker.commit(file.mtime);
                if profile.use_cache {
                    record(cache, file, remote_id, EntryState::Skipped).await?;
                }
            }
            TransferOutcome::Failed { kind, reason } => {
                warn!(path = %file.relative_path, %kind, %reason, "Upload failed");
                tracker.block(file.visibility_floor());
                if profile.use_cache {
                    record(cache, file, String::new(), EntryState::Failed).await?;
                }
                result.record_failure(file.relative_path.clone(), kind, reason);
                return Ok(());
            }
        }

        if profile.remove_uploaded {
            match engine.remove_local(&file.absolute_path).await {
                Ok(()) => {
                    debug!(path = %file.relative_path, "Removed local file");
                    result.local_deleted += 1;
                    if profile.use_cache {
                        cache
                            .remove(&file.relative_path)
                            .await
                            .map_err(SyncError::Store)?;
                    }
                }
                Err(e) => warn!(path = %file.relative_path, error = %e, "Cannot remove local file"),
            }
        }
        Ok(())
    }
}

async fn record(
    cache: &mut dyn IUploadCache,
    file: &ScannedFile,
    remote_id: String,
    state: EntryState,
) -> Result<(), SyncError> {
    cache
        .record(CacheEntry::new(
            file.relative_path.clone(),
            file.size_bytes,
            file.mtime,
            remote_id,
            state,
        ))
        .await
        .map_err(SyncError::Store)
}
