//! PhotoSync Sync - Upload and download engines
//!
//! Provides:
//! - Incremental local-to-OneDrive upload with a durable cache and watermark
//! - Resumable chunked transfers with bounded retries
//! - Camera roll download into a dated folder layout
//! - Per-profile isolation when running several accounts
//!
//! ## Modules
//!
//! - [`matcher`] - Glob filtering of relative paths
//! - [`scanner`] - Local tree enumeration
//! - [`resolver`] - Remote folder lookup and creation, memoized per run
//! - [`transfer`] - Simple and session uploads with verification
//! - [`upload`] - The per-profile upload orchestrator
//! - [`cache_builder`] - Cache bootstrap from the remote tree, cache reset
//! - [`download`] - Camera roll download sync
//! - [`runner`] - Runs every configured profile

pub mod cache_builder;
pub mod download;
pub mod matcher;
pub mod resolver;
pub mod runner;
pub mod scanner;
pub mod transfer;
pub mod upload;

use std::path::PathBuf;

use thiserror::Error;

use photosync_core::domain::{AuthError, DriveError};

pub use cache_builder::{build_cache_from_remote, clear_cache};
pub use download::{sync_camera_roll, DownloadResult};
pub use runner::{CacheStatus, ProfileReport, ProfileRunner, ProfileStatus};
pub use upload::{SyncSettings, UploadSyncOrchestrator};

/// Errors that abort a whole profile run
///
/// Per-file problems never surface here; they are counted in the run result.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The profile could not obtain an access token
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    /// The configured source folder does not exist or is not a directory
    #[error("Source folder missing: {}", .0.display())]
    SourceMissing(PathBuf),

    /// The remote root folder could not be resolved or listed
    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(DriveError),

    /// The profile's settings cannot be used
    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    /// The cache or watermark store failed
    #[error("State store error: {0:#}")]
    Store(anyhow::Error),

    /// An I/O error occurred while scanning or writing files
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
