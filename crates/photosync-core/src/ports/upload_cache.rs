//! Upload cache port
//!
//! The cache answers "has this exact file already been reconciled?" without
//! touching the remote drive. Lookups are served from memory; writes are
//! buffered and made durable in batches by [`IUploadCache::flush`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::domain::cache_entry::{CacheEntry, EntryState};
use crate::domain::newtypes::RelativePath;

/// A scanned local file, keyed by its relative path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalFile {
    pub size_bytes: u64,
    pub mtime: DateTime<Utc>,
}

/// A file enumerated from the remote tree under the profile's root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub relative_path: RelativePath,
    pub remote_id: String,
    pub size_bytes: u64,
}

/// Counts reported by [`IUploadCache::build_from_remote`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub remote_files: u64,
    /// Present locally with the same size, recorded as `Skipped`
    pub matched: u64,
    /// Present locally with a different size, left to be uploaded
    pub size_mismatch: u64,
    /// Not present locally
    pub remote_only: u64,
}

#[async_trait::async_trait]
pub trait IUploadCache: Send {
    fn lookup(&self, relative_path: &RelativePath) -> Option<CacheEntry>;

    /// Upserts the entry for its relative path
    async fn record(&mut self, entry: CacheEntry) -> anyhow::Result<()>;

    async fn remove(&mut self, relative_path: &RelativePath) -> anyhow::Result<()>;

    /// Writes every pending change to durable storage
    async fn flush(&mut self) -> anyhow::Result<()>;

    /// Drops every entry of the profile
    async fn clear(&mut self) -> anyhow::Result<()>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if the durable store was unreadable at open and started empty
    fn recovered_from_corruption(&self) -> bool;

    /// Populates the cache from an enumerated remote tree
    ///
    /// A remote file whose relative path exists locally with an identical
    /// size is recorded as `Skipped` with the local mtime. A size mismatch
    /// removes any existing entry so the file is uploaded on the next run.
    async fn build_from_remote(
        &mut self,
        remote_listing: &[RemoteFile],
        local_index: &HashMap<RelativePath, LocalFile>,
    ) -> anyhow::Result<BuildStats> {
        let mut stats = BuildStats::default();

        for remote in remote_listing {
            stats.remote_files += 1;
            match local_index.get(&remote.relative_path) {
                Some(local) if local.size_bytes == remote.size_bytes => {
                    self.record(CacheEntry::new(
                        remote.relative_path.clone(),
                        local.size_bytes,
                        local.mtime,
                        remote.remote_id.clone(),
                        EntryState::Skipped,
                    ))
                    .await?;
                    stats.matched += 1;
                }
                Some(local) => {
                    debug!(
                        path = %remote.relative_path,
                        local_size = local.size_bytes,
                        remote_size = remote.size_bytes,
                        "Size differs from remote, leaving for upload"
                    );
                    if self.lookup(&remote.relative_path).is_some() {
                        self.remove(&remote.relative_path).await?;
                    }
                    stats.size_mismatch += 1;
                }
                None => stats.remote_only += 1,
            }
        }

        self.flush().await?;
        Ok(stats)
    }
}
