//! SQLite implementation of IUploadCache
//!
//! The whole `upload_cache` table is loaded into a `HashMap` when the cache
//! is opened, so lookups never touch the database. Writes update the map
//! immediately and are queued; the queue is written in a single transaction
//! every `batch_size` operations and on [`flush`](IUploadCache::flush).
//!
//! ## Type Mapping
//!
//! | Domain Type    | SQL Type | Strategy                                  |
//! |----------------|----------|-------------------------------------------|
//! | RelativePath   | TEXT     | `/`-separated string, primary key         |
//! | size_bytes     | INTEGER  | `u64` stored as `i64`                     |
//! | mtime          | INTEGER  | microseconds since the Unix epoch         |
//! | EntryState     | TEXT     | `uploaded` / `skipped` / `failed`         |

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use photosync_core::domain::{CacheEntry, EntryState, RelativePath};
use photosync_core::ports::IUploadCache;

use crate::CacheError;

/// A queued change not yet written to SQLite
#[derive(Debug, Clone)]
enum PendingWrite {
    Upsert(CacheEntry),
    Delete(RelativePath),
}

/// Upload cache backed by one profile's SQLite database
pub struct SqliteUploadCache {
    pool: SqlitePool,
    entries: HashMap<RelativePath, CacheEntry>,
    pending: Vec<PendingWrite>,
    batch_size: usize,
    recovered: bool,
}

impl SqliteUploadCache {
    /// Loads every stored entry into memory
    ///
    /// Rows that cannot be decoded are skipped with a warning. A failure of
    /// the query itself is returned, which the caller treats as corruption.
    pub async fn load(pool: SqlitePool, batch_size: usize) -> Result<Self, CacheError> {
        let mut entries = HashMap::new();
        let mut skipped_rows = 0usize;

        {
            let mut rows = sqlx::query(
                "SELECT relative_path, size_bytes, mtime_us, remote_id, state FROM upload_cache",
            )
            .fetch(&pool);

            while let Some(row) = rows.try_next().await? {
                match entry_from_row(&row) {
                    Ok(entry) => {
                        entries.insert(entry.relative_path.clone(), entry);
                    }
                    Err(e) => {
                        skipped_rows += 1;
                        tracing::warn!(error = %e, "Skipping undecodable cache row");
                    }
                }
            }
        }

        tracing::debug!(
            entries = entries.len(),
            skipped_rows,
            "Upload cache loaded"
        );

        Ok(Self {
            pool,
            entries,
            pending: Vec::new(),
            batch_size: batch_size.max(1),
            recovered: false,
        })
    }

    /// Marks this cache as freshly created after the previous store was lost
    pub fn mark_recovered(&mut self) {
        self.recovered = true;
    }

    /// Number of in-memory entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Number of writes waiting for the next flush
    pub fn pending_writes(&self) -> usize {
        self.pending.len()
    }

    /// Entry counts per state, for status reporting
    pub fn counts_by_state(&self) -> HashMap<EntryState, usize> {
        let mut counts = HashMap::new();
        for entry in self.entries.values() {
            *counts.entry(entry.state).or_insert(0) += 1;
        }
        counts
    }

    async fn write_pending(&mut self) -> Result<(), CacheError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        for write in &self.pending {
            match write {
                PendingWrite::Upsert(entry) => {
                    sqlx::query(
                        "INSERT INTO upload_cache \
                         (relative_path, size_bytes, mtime_us, remote_id, state, updated_at) \
                         VALUES (?, ?, ?, ?, ?, ?) \
                         ON CONFLICT(relative_path) DO UPDATE SET \
                         size_bytes = excluded.size_bytes, \
                         mtime_us = excluded.mtime_us, \
                         remote_id = excluded.remote_id, \
                         state = excluded.state, \
                         updated_at = excluded.updated_at",
                    )
                    .bind(entry.relative_path.as_str())
                    .bind(entry.size_bytes as i64)
                    .bind(entry.mtime.timestamp_micros())
                    .bind(&entry.remote_id)
                    .bind(entry.state.as_str())
                    .bind(&now)
                    .execute(&mut *tx)
                    .await?;
                }
                PendingWrite::Delete(path) => {
                    sqlx::query("DELETE FROM upload_cache WHERE relative_path = ?")
                        .bind(path.as_str())
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;

        tracing::trace!(rows = self.pending.len(), "Upload cache batch committed");
        self.pending.clear();
        Ok(())
    }

    async fn enqueue(&mut self, write: PendingWrite) -> Result<(), CacheError> {
        self.pending.push(write);
        if self.pending.len() >= self.batch_size {
            self.write_pending().await?;
        }
        Ok(())
    }
}

/// Reconstruct a CacheEntry from a database row
fn entry_from_row(row: &SqliteRow) -> Result<CacheEntry, CacheError> {
    let path: String = row.try_get("relative_path")?;
    let size_bytes: i64 = row.try_get("size_bytes")?;
    let mtime_us: i64 = row.try_get("mtime_us")?;
    let remote_id: String = row.try_get("remote_id")?;
    let state: String = row.try_get("state")?;

    let relative_path =
        RelativePath::new(path).map_err(|e| CacheError::SerializationError(e.to_string()))?;
    let size_bytes = u64::try_from(size_bytes).map_err(|_| {
        CacheError::SerializationError(format!("negative size for {relative_path}"))
    })?;
    let mtime = DateTime::<Utc>::from_timestamp_micros(mtime_us).ok_or_else(|| {
        CacheError::SerializationError(format!("mtime out of range for {relative_path}"))
    })?;
    let state = state
        .parse::<EntryState>()
        .map_err(|e| CacheError::SerializationError(e.to_string()))?;

    Ok(CacheEntry::new(
        relative_path,
        size_bytes,
        mtime,
        remote_id,
        state,
    ))
}

#[async_trait::async_trait]
impl IUploadCache for SqliteUploadCache {
    fn lookup(&self, relative_path: &RelativePath) -> Option<CacheEntry> {
        self.entries.get(relative_path).cloned()
    }

    async fn record(&mut self, entry: CacheEntry) -> anyhow::Result<()> {
        self.entries
            .insert(entry.relative_path.clone(), entry.clone());
        self.enqueue(PendingWrite::Upsert(entry)).await?;
        Ok(())
    }

    async fn remove(&mut self, relative_path: &RelativePath) -> anyhow::Result<()> {
        self.entries.remove(relative_path);
        self.enqueue(PendingWrite::Delete(relative_path.clone()))
            .await?;
        Ok(())
    }

    async fn flush(&mut self) -> anyhow::Result<()> {
        self.write_pending().await?;
        Ok(())
    }

    async fn clear(&mut self) -> anyhow::Result<()> {
        self.pending.clear();
        self.entries.clear();
        sqlx::query("DELETE FROM upload_cache")
            .execute(&self.pool)
            .await
            .map_err(CacheError::from)?;
        tracing::info!("Upload cache cleared");
        Ok(())
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn recovered_from_corruption(&self) -> bool {
        self.recovered
    }
}
