//! Remote drive port (driven/secondary port)
//!
//! Every method returns a classified [`DriveError`] so callers can decide
//! between retrying, failing one file, or aborting the run.

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::DriveError;
use crate::domain::newtypes::RemotePath;
use crate::ports::authenticator::IAuthenticator;

/// Metadata of a remote file or folder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteItem {
    /// Provider-specific item identifier
    pub id: String,
    pub name: String,
    /// Size in bytes (folders report the size of their content)
    pub size: u64,
    pub is_folder: bool,
    pub created: Option<DateTime<Utc>>,
    pub last_modified: Option<DateTime<Utc>>,
    /// Capture time from photo metadata, when present
    pub taken: Option<DateTime<Utc>>,
}

/// What the service does when the target name already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictBehavior {
    /// Overwrite the existing item
    Replace,
    /// Reject the upload with [`DriveError::Conflict`]
    Fail,
}

impl ConflictBehavior {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictBehavior::Replace => "replace",
            ConflictBehavior::Fail => "fail",
        }
    }
}

/// An open resumable upload session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    /// Pre-authenticated URL that receives the byte ranges
    pub upload_url: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Server acknowledgement of one uploaded byte range
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkAck {
    /// The range was stored; the next range must start at `next_offset`
    Accepted { next_offset: u64 },
    /// The last range was stored and the item was created
    Completed(RemoteItem),
}

/// Port trait for remote drive operations
#[async_trait::async_trait]
pub trait IDriveClient: Send + Sync {
    /// Looks up an item by absolute path; `Ok(None)` if it does not exist
    async fn get_item_by_path(&self, path: &RemotePath) -> Result<Option<RemoteItem>, DriveError>;

    /// Looks up a direct child of a folder by name; `Ok(None)` if absent
    async fn get_child(&self, folder_id: &str, name: &str)
        -> Result<Option<RemoteItem>, DriveError>;

    /// Lists every child of a folder, following pagination
    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteItem>, DriveError>;

    /// Creates a folder; fails with [`DriveError::Conflict`] if the name exists
    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<RemoteItem, DriveError>;

    /// Uploads a small file in a single request
    async fn upload_simple(
        &self,
        folder_id: &str,
        name: &str,
        data: Vec<u8>,
        conflict: ConflictBehavior,
    ) -> Result<RemoteItem, DriveError>;

    /// Opens a resumable upload session
    async fn upload_session_start(
        &self,
        folder_id: &str,
        name: &str,
        conflict: ConflictBehavior,
    ) -> Result<UploadSession, DriveError>;

    /// Sends bytes `offset..offset + chunk.len()` of a `total`-byte file
    async fn upload_session_append(
        &self,
        session: &UploadSession,
        offset: u64,
        total: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkAck, DriveError>;

    /// Abandons a session so the service can discard stored ranges
    async fn upload_session_cancel(&self, session: &UploadSession) -> Result<(), DriveError>;

    async fn delete_item(&self, item_id: &str) -> Result<(), DriveError>;

    /// Lists the files of the special camera roll folder
    async fn camera_roll_items(&self) -> Result<Vec<RemoteItem>, DriveError>;

    /// Streams an item's content into `destination`, returning bytes written
    async fn download_item(&self, item_id: &str, destination: &Path) -> Result<u64, DriveError>;
}

/// Builds drive clients for one profile
///
/// Clients start with `access_token` and ask `authenticator` for a renewed
/// token when the service rejects the current one.
pub trait IDriveClientFactory: Send + Sync {
    fn create(
        &self,
        profile: &str,
        access_token: String,
        authenticator: Arc<dyn IAuthenticator>,
    ) -> Arc<dyn IDriveClient>;
}
