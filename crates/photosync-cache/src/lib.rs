//! PhotoSync Cache - Per-profile state persistence
//!
//! SQLite-based storage for:
//! - The upload cache (files already reconciled with the remote drive)
//! - The incremental scan watermark
//!
//! ## Architecture
//!
//! This crate implements the `IUploadCache` and `IWatermarkStore` ports from
//! `photosync-core`. Each profile owns one database file holding both tables.
//!
//! ## Key Components
//!
//! - [`DatabasePool`] - Connection pool with migration support
//! - [`SqliteUploadCache`] - In-memory index with batched durable writes
//! - [`SqliteWatermarkStore`] - Monotonic watermark records
//! - [`ProfileStore`] - Opens a profile's database, recovering from corruption
//! - [`CacheError`] - Error types for cache operations
//!
//! ## Usage
//!
//! ```no_run
//! use std::path::Path;
//! use photosync_cache::ProfileStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = ProfileStore::open(Path::new("./data/state"), "alice", 500).await?;
//! println!("{} cached files", store.cache.entry_count());
//! # Ok(())
//! # }
//! ```

pub mod pool;
pub mod store;
pub mod upload_cache;
pub mod watermark;

pub use pool::DatabasePool;
pub use store::ProfileStore;
pub use upload_cache::SqliteUploadCache;
pub use watermark::SqliteWatermarkStore;

/// Errors that can occur during cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Failed to establish a database connection
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// A database query failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Schema migration failed
    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    /// A stored row could not be converted into a domain value
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<sqlx::Error> for CacheError {
    fn from(e: sqlx::Error) -> Self {
        CacheError::QueryFailed(e.to_string())
    }
}
