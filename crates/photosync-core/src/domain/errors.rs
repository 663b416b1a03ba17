//! Domain error types
//!
//! - [`DomainError`] - validation failures for paths and domain values
//! - [`DriveError`] - classified failures from the remote drive port
//! - [`AuthError`] - failures obtaining an access token for a profile

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid local relative path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Path is not within the profile's source folder
    #[error("Path not within source folder: {0}")]
    PathNotInSource(String),

    /// Unknown serialized entry state
    #[error("Invalid entry state: {0}")]
    InvalidState(String),
}

/// Classified errors returned by [`IDriveClient`](crate::ports::IDriveClient)
///
/// The classification decides what the caller does next: transient errors
/// are retried through [`RetryPolicy`](crate::retry::RetryPolicy), everything
/// else fails the current file immediately.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DriveError {
    /// The access token was rejected (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Quota exhausted or operation forbidden (HTTP 403, 507)
    #[error("Quota or permission error: {0}")]
    QuotaOrPermission(String),

    /// The requested item does not exist (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// An item with the same name already exists (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Network failure, timeout, throttling or server error (429, 5xx)
    #[error("Transient error: {0}")]
    Transient(String),

    /// The response was malformed or had an unexpected status
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DriveError {
    /// Returns true if retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, DriveError::Transient(_))
    }
}

/// Errors obtaining an access token for a profile
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// The interactive login did not complete in time
    #[error("Authentication timed out after {0}s")]
    Timeout(u64),

    /// The user or the identity provider refused the request
    #[error("Authentication denied: {0}")]
    Denied(String),

    /// Stored tokens could not be read or written
    #[error("Token storage error: {0}")]
    Storage(String),

    /// The OAuth flow failed for another reason
    #[error("Authentication flow failed: {0}")]
    Flow(String),
}
