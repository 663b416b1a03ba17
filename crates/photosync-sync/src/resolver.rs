//! Remote folder resolution
//!
//! [`RemoteFolderResolver`] maps a relative directory of the source tree to
//! the id of the matching folder under the profile's remote root, creating
//! missing folders one segment at a time. Results, failures included, are
//! memoized for the lifetime of the resolver, which is one run. OneDrive
//! names are case-insensitive, so the memo is keyed by lowercased path.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use photosync_core::domain::{DriveError, RemotePath};
use photosync_core::ports::IDriveClient;
use photosync_core::retry::RetryPolicy;

/// A relative directory whose remote folder could not be obtained
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve remote folder for '{path}': {reason}")]
pub struct FolderResolutionError {
    pub path: String,
    pub reason: String,
}

/// Per-run resolver of remote folder ids
pub struct RemoteFolderResolver {
    drive: Arc<dyn IDriveClient>,
    retry: RetryPolicy,
    root: RemotePath,
    preserve_structure: bool,
    /// Lowercased relative directory (`""` is the root) to folder id or failure reason
    memo: HashMap<String, Result<String, String>>,
}

impl RemoteFolderResolver {
    pub fn new(
        drive: Arc<dyn IDriveClient>,
        root: RemotePath,
        preserve_structure: bool,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            drive,
            retry,
            root,
            preserve_structure,
            memo: HashMap::new(),
        }
    }

    /// Resolves the profile's remote root, creating it if missing
    pub async fn resolve_root(&mut self) -> Result<String, DriveError> {
        if let Some(Ok(id)) = self.memo.get("") {
            return Ok(id.clone());
        }

        let result = self.lookup_or_create_root().await;
        self.memo
            .insert(String::new(), result.as_ref().cloned().map_err(|e| e.to_string()));
        result
    }

    async fn lookup_or_create_root(&self) -> Result<String, DriveError> {
        let root = &self.root;
        let drive = &self.drive;
        let existing = self
            .retry
            .run("get remote root", || drive.get_item_by_path(root))
            .await?;

        match existing {
            Some(item) if item.is_folder => {
                debug!(root = %root, id = %item.id, "Remote root exists");
                Ok(item.id)
            }
            Some(_) => Err(DriveError::Conflict(format!("{root} exists and is not a folder"))),
            None => {
                info!(root = %root, "Creating remote root folder");
                let drive_root = RemotePath::root();
                let mut parent_id = self
                    .retry
                    .run("get drive root", || drive.get_item_by_path(&drive_root))
                    .await?
                    .map(|item| item.id)
                    .ok_or_else(|| DriveError::NotFound("drive root".to_string()))?;
                for segment in root.segments() {
                    parent_id = self.ensure_child(&parent_id, segment).await?;
                }
                Ok(parent_id)
            }
        }
    }

    /// Returns the folder id for `relative_dir` (`""` is the root)
    ///
    /// With `preserve_structure = false` every directory maps to the root.
    pub async fn resolve(&mut self, relative_dir: &str) -> Result<String, FolderResolutionError> {
        let key = if self.preserve_structure { relative_dir } else { "" };
        let folded = key.to_lowercase();

        if let Some(cached) = self.memo.get(&folded) {
            return cached.clone().map_err(|reason| FolderResolutionError {
                path: key.to_string(),
                reason,
            });
        }

        let mut parent_id = self
            .resolve_root()
            .await
            .map_err(|e| FolderResolutionError {
                path: String::new(),
                reason: e.to_string(),
            })?;
        if key.is_empty() {
            return Ok(parent_id);
        }

        let mut prefix = String::new();
        for segment in key.split('/') {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);

            let prefix_key = prefix.to_lowercase();
            let resolved = match self.memo.get(&prefix_key) {
                Some(cached) => cached.clone(),
                None => {
                    let result = self
                        .ensure_child(&parent_id, segment)
                        .await
                        .map_err(|e| e.to_string());
                    if let Err(reason) = &result {
                        warn!(path = %prefix, %reason, "Remote folder unavailable");
                    }
                    self.memo.insert(prefix_key, result.clone());
                    result
                }
            };

            match resolved {
                Ok(id) => parent_id = id,
                Err(reason) => {
                    // Deeper directories inherit the failure without another request
                    self.memo.insert(folded, Err(reason.clone()));
                    return Err(FolderResolutionError {
                        path: key.to_string(),
                        reason,
                    });
                }
            }
        }

        Ok(parent_id)
    }

    /// Returns the id of folder `name` under `parent_id`, creating it if absent
    async fn ensure_child(&self, parent_id: &str, name: &str) -> Result<String, DriveError> {
        let drive = &self.drive;

        if let Some(id) = self.existing_folder(parent_id, name).await? {
            return Ok(id);
        }

        match self
            .retry
            .run("create folder", || drive.create_folder(parent_id, name))
            .await
        {
            Ok(item) => {
                debug!(parent_id, name, id = %item.id, "Created remote folder");
                Ok(item.id)
            }
            Err(DriveError::Conflict(detail)) => {
                debug!(parent_id, name, "Folder appeared concurrently, looking it up again");
                self.existing_folder(parent_id, name)
                    .await?
                    .ok_or(DriveError::Conflict(detail))
            }
            Err(e) => Err(e),
        }
    }

    async fn existing_folder(&self, parent_id: &str, name: &str) -> Result<Option<String>, DriveError> {
        let drive = &self.drive;
        match self
            .retry
            .run("get folder", || drive.get_child(parent_id, name))
            .await?
        {
            Some(item) if item.is_folder => Ok(Some(item.id)),
            Some(_) => Err(DriveError::Conflict(format!(
                "'{name}' exists and is not a folder"
            ))),
            None => Ok(None),
        }
    }
}
