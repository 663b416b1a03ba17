//! Cache bootstrap and reset
//!
//! [`build_cache_from_remote`] lets a profile adopt files that already exist
//! on OneDrive (uploaded by another tool, or before the cache existed)
//! without sending them again. [`clear_cache`] forgets everything so the
//! next run reconciles the whole tree.

use std::collections::{HashMap, VecDeque};

use tracing::{debug, info};

use photosync_core::config::UploadProfile;
use photosync_core::domain::{DriveError, RelativePath, RemotePath};
use photosync_core::ports::{
    BuildStats, IDriveClient, IUploadCache, IWatermarkStore, LocalFile, RemoteFile,
};
use photosync_core::retry::RetryPolicy;

use crate::matcher::PathMatcher;
use crate::scanner;
use crate::SyncError;

/// Enumerates every file under `root`, recursively
///
/// Paths are relative to `root`.
pub async fn list_remote_tree(
    drive: &dyn IDriveClient,
    root: &RemotePath,
    retry: &RetryPolicy,
) -> Result<Vec<RemoteFile>, SyncError> {
    let root_item = retry
        .run("get remote root", || drive.get_item_by_path(root))
        .await
        .map_err(SyncError::RemoteUnavailable)?
        .ok_or_else(|| {
            SyncError::RemoteUnavailable(DriveError::NotFound(format!(
                "remote folder {root} does not exist"
            )))
        })?;

    let mut files = Vec::new();
    let mut queue: VecDeque<(String, String)> = VecDeque::from([(root_item.id, String::new())]);
    let mut folders = 0usize;

    while let Some((folder_id, prefix)) = queue.pop_front() {
        folders += 1;
        let children = retry
            .run("list folder", || drive.list_folder(&folder_id))
            .await
            .map_err(SyncError::RemoteUnavailable)?;

        for child in children {
            let path = if prefix.is_empty() {
                child.name.clone()
            } else {
                format!("{prefix}/{}", child.name)
            };
            if child.is_folder {
                queue.push_back((child.id, path));
                continue;
            }
            match RelativePath::new(path) {
                Ok(relative_path) => files.push(RemoteFile {
                    relative_path,
                    remote_id: child.id,
                    size_bytes: child.size,
                }),
                Err(e) => debug!(error = %e, "Skipping remote item with unusable name"),
            }
        }
    }

    info!(root = %root, folders, files = files.len(), "Remote tree listed");
    Ok(files)
}

/// Populates the profile's cache from the files already on OneDrive
///
/// Only pattern-matched local files take part. For flattened profiles a
/// remote file is paired with the local file that would be uploaded under
/// its name.
pub async fn build_cache_from_remote(
    drive: &dyn IDriveClient,
    profile: &UploadProfile,
    cache: &mut dyn IUploadCache,
    retry: &RetryPolicy,
) -> Result<BuildStats, SyncError> {
    if !profile.source_folder.is_dir() {
        return Err(SyncError::SourceMissing(profile.source_folder.clone()));
    }
    let matcher = PathMatcher::new(&profile.file_patterns)
        .map_err(|e| SyncError::InvalidProfile(format!("bad file pattern: {e}")))?;
    let root = profile
        .remote_root()
        .map_err(|e| SyncError::InvalidProfile(e.to_string()))?;

    info!(profile = %profile.name, root = %root, "Building cache from remote listing");
    let mut remote = list_remote_tree(drive, &root, retry).await?;

    let local = scanner::scan(&profile.source_folder, &matcher, None).await?.files;

    if !profile.preserve_structure {
        // Newest local file wins each remote name, as in upload runs
        let mut by_name: HashMap<String, (&RelativePath, _)> = HashMap::new();
        for f in &local {
            let key = f.relative_path.file_name().to_lowercase();
            let candidate = (&f.relative_path, f.mtime);
            by_name
                .entry(key)
                .and_modify(|cur| {
                    if (candidate.1, candidate.0) > (cur.1, cur.0) {
                        *cur = candidate;
                    }
                })
                .or_insert(candidate);
        }
        remote.retain(|r| r.relative_path.parent_dir().is_empty());
        for r in &mut remote {
            if let Some((path, _)) = by_name.get(&r.relative_path.file_name().to_lowercase()) {
                r.relative_path = (*path).clone();
            }
        }
    }

    let local_index: HashMap<RelativePath, LocalFile> = local
        .iter()
        .map(|f| {
            (
                f.relative_path.clone(),
                LocalFile {
                    size_bytes: f.size_bytes,
                    mtime: f.mtime,
                },
            )
        })
        .collect();

    let stats = cache
        .build_from_remote(&remote, &local_index)
        .await
        .map_err(SyncError::Store)?;

    info!(
        profile = %profile.name,
        remote_files = stats.remote_files,
        matched = stats.matched,
        size_mismatch = stats.size_mismatch,
        remote_only = stats.remote_only,
        "Cache build complete"
    );
    Ok(stats)
}

/// Drops every cache entry of the profile and resets its watermark
pub async fn clear_cache(
    profile_name: &str,
    cache: &mut dyn IUploadCache,
    watermarks: &dyn IWatermarkStore,
) -> Result<(), SyncError> {
    let entries = cache.len();
    cache.clear().await.map_err(SyncError::Store)?;
    watermarks
        .reset(profile_name)
        .await
        .map_err(SyncError::Store)?;
    info!(profile = profile_name, entries, "Cache cleared");
    Ok(())
}
