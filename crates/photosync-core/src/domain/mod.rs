//! Domain entities and value types
//!
//! - Newtypes for validated local/remote paths
//! - Upload cache entries and their reconciliation state
//! - Per-profile watermark records
//! - Transfer outcomes and run-level results
//! - Domain-specific error types

pub mod cache_entry;
pub mod errors;
pub mod newtypes;
pub mod outcome;
pub mod watermark;

pub use cache_entry::{normalize_mtime, CacheEntry, EntryState};
pub use errors::{AuthError, DomainError, DriveError};
pub use newtypes::{RelativePath, RemotePath};
pub use outcome::{FailureKind, FileFailure, RunResult, TransferOutcome};
pub use watermark::WatermarkRecord;
