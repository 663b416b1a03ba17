//! Per-profile state database
//!
//! Each profile owns `{state_dir}/{profile}.db`, holding its upload cache and
//! watermark. A database that cannot be opened, migrated or read is moved
//! aside as `{profile}.db.corrupt-<timestamp>` and replaced by a fresh one.
//! If that fails too, the profile runs against an in-memory database.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::{CacheError, DatabasePool, SqliteUploadCache, SqliteWatermarkStore};

/// Cache and watermark store of one profile
pub struct ProfileStore {
    pub cache: SqliteUploadCache,
    pub watermarks: SqliteWatermarkStore,
    /// `None` when running against an in-memory database
    db_path: Option<PathBuf>,
    pool: DatabasePool,
}

impl ProfileStore {
    /// Path of a profile's database file
    pub fn db_path_for(state_dir: &Path, profile: &str) -> PathBuf {
        state_dir.join(format!("{profile}.db"))
    }

    /// Opens the profile's database, recovering from corruption
    ///
    /// # Errors
    ///
    /// Only fails if even the in-memory fallback cannot be created.
    pub async fn open(
        state_dir: &Path,
        profile: &str,
        batch_size: usize,
    ) -> Result<Self, CacheError> {
        let db_path = Self::db_path_for(state_dir, profile);

        let first_error = match Self::try_open(&db_path, batch_size).await {
            Ok(store) => return Ok(store),
            Err(e) => e,
        };

        tracing::warn!(
            profile,
            path = %db_path.display(),
            error = %first_error,
            "Profile database unreadable, starting a fresh cache"
        );
        quarantine(&db_path);

        match Self::try_open(&db_path, batch_size).await {
            Ok(mut store) => {
                store.cache.mark_recovered();
                Ok(store)
            }
            Err(e) => {
                tracing::warn!(
                    profile,
                    error = %e,
                    "Cannot recreate profile database, using an in-memory cache for this run"
                );
                let mut store = Self::in_memory(batch_size).await?;
                store.cache.mark_recovered();
                Ok(store)
            }
        }
    }

    /// Creates a store backed by an in-memory database
    pub async fn in_memory(batch_size: usize) -> Result<Self, CacheError> {
        let pool = DatabasePool::in_memory().await?;
        Self::from_pool(pool, None, batch_size).await
    }

    /// Database file in use, `None` for in-memory stores
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    /// Closes the underlying connections
    pub async fn close(&self) {
        self.pool.close().await;
    }

    async fn try_open(db_path: &Path, batch_size: usize) -> Result<Self, CacheError> {
        let pool = DatabasePool::new(db_path).await?;
        if let Err(e) = pool.check_integrity().await {
            pool.close().await;
            return Err(e);
        }
        match Self::from_pool(pool.clone(), Some(db_path.to_path_buf()), batch_size).await {
            Ok(store) => Ok(store),
            Err(e) => {
                pool.close().await;
                Err(e)
            }
        }
    }

    async fn from_pool(
        pool: DatabasePool,
        db_path: Option<PathBuf>,
        batch_size: usize,
    ) -> Result<Self, CacheError> {
        let cache = SqliteUploadCache::load(pool.pool().clone(), batch_size).await?;
        let watermarks = SqliteWatermarkStore::new(pool.pool().clone());
        Ok(Self {
            cache,
            watermarks,
            db_path,
            pool,
        })
    }
}

/// Moves a damaged database and its WAL side files out of the way
fn quarantine(db_path: &Path) {
    let suffix = format!("corrupt-{}", Utc::now().format("%Y%m%dT%H%M%S"));

    for ext in ["", "-wal", "-shm"] {
        let mut source = db_path.as_os_str().to_owned();
        source.push(ext);
        let source = PathBuf::from(source);
        if !source.exists() {
            continue;
        }

        let mut target = source.as_os_str().to_owned();
        target.push(format!(".{suffix}"));
        let target = PathBuf::from(target);

        match std::fs::rename(&source, &target) {
            Ok(()) => tracing::warn!(
                from = %source.display(),
                to = %target.display(),
                "Moved damaged database file aside"
            ),
            Err(e) => tracing::warn!(
                path = %source.display(),
                error = %e,
                "Failed to move damaged database file aside"
            ),
        }
    }
}
