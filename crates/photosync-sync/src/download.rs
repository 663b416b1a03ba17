//! Camera roll download sync
//!
//! Copies every file of the OneDrive camera roll into
//! `<destination>/<YYYY>/<YYYY_MM_DD>/<name>`, dated by the photo's capture
//! time, falling back to the item's created and then last-modified time.
//! Downloads go to a hidden `.partial` file next to the target and are
//! renamed into place once their size is verified.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use photosync_core::config::DownloadProfile;
use photosync_core::ports::{IDriveClient, RemoteItem};

use crate::SyncError;

/// Counters of one camera roll sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadResult {
    pub synced: u64,
    pub skipped: u64,
    pub errors: u64,
    /// Remote items deleted after a verified local copy
    pub deleted: u64,
    pub cancelled: bool,
}

/// Capture date of an item: photo metadata, then created, then modified
pub fn item_date(item: &RemoteItem) -> Option<DateTime<Utc>> {
    item.taken.or(item.created).or(item.last_modified)
}

/// `<destination>/<YYYY>/<YYYY_MM_DD>/<name>`
pub fn storage_path(destination: &Path, date: DateTime<Utc>, name: &str) -> PathBuf {
    destination
        .join(date.format("%Y").to_string())
        .join(date.format("%Y_%m_%d").to_string())
        .join(name)
}

fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(|c: char| c == '/' || c == '\\')
}

async fn local_size(path: &Path) -> Option<u64> {
    tokio::fs::metadata(path).await.ok().map(|m| m.len())
}

/// Downloads new camera roll items for one profile
///
/// # Errors
/// Fails only if the camera roll cannot be listed; per-item problems are
/// counted in [`DownloadResult::errors`].
pub async fn sync_camera_roll(
    drive: &dyn IDriveClient,
    profile: &DownloadProfile,
    cancel: &CancellationToken,
) -> Result<DownloadResult, SyncError> {
    info!(profile = %profile.name, destination = %profile.destination_folder.display(), "Starting camera roll sync");
    let items = drive
        .camera_roll_items()
        .await
        .map_err(SyncError::RemoteUnavailable)?;
    info!(profile = %profile.name, items = items.len(), "Camera roll listed");

    let mut result = DownloadResult::default();

    for item in &items {
        if cancel.is_cancelled() {
            result.cancelled = true;
            break;
        }
        if item.is_folder {
            debug!(name = %item.name, "Skipping folder");
            continue;
        }

        let Some(date) = item_date(item) else {
            warn!(name = %item.name, "No date information, skipping");
            result.skipped += 1;
            continue;
        };
        if !is_safe_name(&item.name) {
            warn!(name = %item.name, "Unusable file name, skipping");
            result.errors += 1;
            continue;
        }

        let target = storage_path(&profile.destination_folder, date, &item.name);

        if let Some(size) = local_size(&target).await {
            if size == item.size {
                debug!(name = %item.name, "Already exists and is valid");
                result.skipped += 1;
                remove_remote(drive, profile, item, &mut result).await;
                continue;
            }
            warn!(name = %item.name, local = size, remote = item.size, "Exists but invalid, re-downloading");
        }

        match download_verified(drive, item, &target).await {
            Ok(()) => {
                info!(name = %item.name, path = %target.display(), "Synced");
                result.synced += 1;
                remove_remote(drive, profile, item, &mut result).await;
            }
            Err(reason) => {
                error!(name = %item.name, %reason, "Download failed");
                result.errors += 1;
            }
        }
    }

    info!(
        profile = %profile.name,
        synced = result.synced,
        skipped = result.skipped,
        errors = result.errors,
        deleted = result.deleted,
        "Camera roll sync complete"
    );
    Ok(result)
}

async fn download_verified(
    drive: &dyn IDriveClient,
    item: &RemoteItem,
    target: &Path,
) -> Result<(), String> {
    let dir = target
        .parent()
        .ok_or_else(|| format!("no parent directory for {}", target.display()))?;
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| format!("cannot create {}: {e}", dir.display()))?;

    let partial = dir.join(format!(".{}.partial", item.name));
    let written = match drive.download_item(&item.id, &partial).await {
        Ok(n) => n,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e.to_string());
        }
    };

    if written != item.size {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(format!("size mismatch: got {written}, expected {}", item.size));
    }

    tokio::fs::rename(&partial, target)
        .await
        .map_err(|e| format!("cannot move into place: {e}"))
}

async fn remove_remote(
    drive: &dyn IDriveClient,
    profile: &DownloadProfile,
    item: &RemoteItem,
    result: &mut DownloadResult,
) {
    if !profile.remove_downloaded {
        return;
    }
    match drive.delete_item(&item.id).await {
        Ok(()) => {
            debug!(name = %item.name, "Deleted from OneDrive");
            result.deleted += 1;
        }
        Err(e) => warn!(name = %item.name, error = %e, "Could not delete from OneDrive"),
    }
}
