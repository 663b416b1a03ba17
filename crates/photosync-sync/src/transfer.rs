//! File transfer to the remote drive
//!
//! [`TransferEngine`] sends one local file into a remote folder and reports a
//! [`TransferOutcome`]. It never returns an error: every failure is
//! classified into a [`FailureKind`] so the caller can record it and move on.
//!
//! ## Transfer modes
//!
//! - Files up to [`SIMPLE_UPLOAD_LIMIT`] go in a single PUT
//! - Larger files use an upload session, sent sequentially in chunks.
//!   A transient chunk failure re-sends the same range on the same session;
//!   any other failure cancels the session.
//!
//! The remote-reported size is checked against the scanned local size before
//! an upload counts as completed.

use std::io::SeekFrom;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use photosync_core::config::RemoteConflictPolicy;
use photosync_core::domain::{DriveError, FailureKind, TransferOutcome};
use photosync_core::ports::{ChunkAck, ConflictBehavior, IDriveClient, RemoteItem, UploadSession};
use photosync_core::retry::RetryPolicy;

/// Largest file sent with a single request (4 MiB)
pub const SIMPLE_UPLOAD_LIMIT: u64 = 4 * 1024 * 1024;

/// Maps a drive error onto the per-file failure class
pub fn failure_kind(err: &DriveError) -> FailureKind {
    match err {
        DriveError::Transient(_) => FailureKind::TransientNetwork,
        DriveError::Unauthorized(_) | DriveError::QuotaOrPermission(_) => {
            FailureKind::QuotaOrPermission
        }
        DriveError::NotFound(_) | DriveError::Conflict(_) | DriveError::InvalidResponse(_) => {
            FailureKind::RemoteRejected
        }
    }
}

#[derive(Debug)]
enum SendError {
    Local(std::io::Error),
    Drive(DriveError),
}

impl From<std::io::Error> for SendError {
    fn from(e: std::io::Error) -> Self {
        SendError::Local(e)
    }
}

impl From<DriveError> for SendError {
    fn from(e: DriveError) -> Self {
        SendError::Drive(e)
    }
}

impl SendError {
    fn into_outcome(self) -> TransferOutcome {
        match self {
            SendError::Local(e) => TransferOutcome::failed(FailureKind::LocalIo, e.to_string()),
            SendError::Drive(e) => TransferOutcome::failed(failure_kind(&e), e.to_string()),
        }
    }
}

/// One file to send
#[derive(Debug, Clone, Copy)]
pub struct TransferRequest<'a> {
    pub local_path: &'a Path,
    /// Size recorded by the scan; the remote item must match it
    pub size_bytes: u64,
    pub folder_id: &'a str,
    pub remote_name: &'a str,
}

/// Uploads single files with retries, sessions and verification
pub struct TransferEngine {
    drive: Arc<dyn IDriveClient>,
    retry: RetryPolicy,
    chunk_size: usize,
}

impl TransferEngine {
    /// `chunk_size` should be a multiple of 320 KiB for OneDrive sessions
    pub fn new(drive: Arc<dyn IDriveClient>, retry: RetryPolicy, chunk_size: usize) -> Self {
        Self {
            drive,
            retry,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Sends a file according to the profile's remote conflict policy
    pub async fn upload(
        &self,
        request: TransferRequest<'_>,
        policy: RemoteConflictPolicy,
    ) -> TransferOutcome {
        let first_behavior = match policy {
            RemoteConflictPolicy::Replace => ConflictBehavior::Replace,
            RemoteConflictPolicy::SkipSameSize => ConflictBehavior::Fail,
        };

        match self.send(request, first_behavior).await {
            Err(SendError::Drive(DriveError::Conflict(_)))
                if policy == RemoteConflictPolicy::SkipSameSize =>
            {
                self.resolve_existing(request).await
            }
            result => verify(request, result),
        }
    }

    /// Handles a name clash under `skip_same_size`
    async fn resolve_existing(&self, request: TransferRequest<'_>) -> TransferOutcome {
        let drive = &self.drive;
        let existing = self
            .retry
            .run("get existing item", || {
                drive.get_child(request.folder_id, request.remote_name)
            })
            .await;

        match existing {
            Ok(Some(item)) if !item.is_folder && item.size == request.size_bytes => {
                debug!(
                    name = request.remote_name,
                    id = %item.id,
                    "Remote file with same size exists, skipping"
                );
                TransferOutcome::SkippedAlreadyExists { remote_id: item.id }
            }
            Ok(_) => {
                debug!(name = request.remote_name, "Remote file differs, replacing");
                let result = self.send(request, ConflictBehavior::Replace).await;
                verify(request, result)
            }
            Err(e) => SendError::Drive(e).into_outcome(),
        }
    }

    async fn send(
        &self,
        request: TransferRequest<'_>,
        behavior: ConflictBehavior,
    ) -> Result<RemoteItem, SendError> {
        if request.size_bytes <= SIMPLE_UPLOAD_LIMIT {
            self.send_simple(request, behavior).await
        } else {
            self.send_session(request, behavior).await
        }
    }

    async fn send_simple(
        &self,
        request: TransferRequest<'_>,
        behavior: ConflictBehavior,
    ) -> Result<RemoteItem, SendError> {
        let data = tokio::fs::read(request.local_path).await?;
        let drive = &self.drive;
        let item = self
            .retry
            .run("simple upload", || {
                drive.upload_simple(request.folder_id, request.remote_name, data.clone(), behavior)
            })
            .await?;
        Ok(item)
    }

    async fn send_session(
        &self,
        request: TransferRequest<'_>,
        behavior: ConflictBehavior,
    ) -> Result<RemoteItem, SendError> {
        let drive = &self.drive;
        let session = self
            .retry
            .run("create upload session", || {
                drive.upload_session_start(request.folder_id, request.remote_name, behavior)
            })
            .await?;

        match self.send_chunks(request, &session).await {
            Ok(item) => Ok(item),
            Err(e) => {
                if let Err(cancel_err) = self.drive.upload_session_cancel(&session).await {
                    debug!(error = %cancel_err, "Could not cancel upload session");
                }
                Err(e)
            }
        }
    }

    async fn send_chunks(
        &self,
        request: TransferRequest<'_>,
        session: &UploadSession,
    ) -> Result<RemoteItem, SendError> {
        let total = request.size_bytes;
        let mut file = tokio::fs::File::open(request.local_path).await?;
        let mut offset = 0u64;
        let drive = &self.drive;

        loop {
            if offset >= total {
                return Err(SendError::Drive(DriveError::InvalidResponse(format!(
                    "session did not complete after {total} bytes"
                ))));
            }

            let len = (self.chunk_size as u64).min(total - offset) as usize;
            let mut chunk = vec![0u8; len];
            file.seek(SeekFrom::Start(offset)).await?;
            file.read_exact(&mut chunk).await?;

            let ack = self
                .retry
                .run("upload chunk", || {
                    drive.upload_session_append(session, offset, total, chunk.clone())
                })
                .await?;

            match ack {
                ChunkAck::Accepted { next_offset } => {
                    if next_offset <= offset {
                        return Err(SendError::Drive(DriveError::InvalidResponse(format!(
                            "session made no progress at offset {offset}"
                        ))));
                    }
                    debug!(
                        name = request.remote_name,
                        offset = next_offset,
                        total,
                        "Chunk acknowledged"
                    );
                    offset = next_offset;
                }
                ChunkAck::Completed(item) => return Ok(item),
            }
        }
    }

    /// Deletes a local file after its upload was verified
    pub async fn remove_local(&self, path: &Path) -> std::io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

fn verify(request: TransferRequest<'_>, result: Result<RemoteItem, SendError>) -> TransferOutcome {
    match result {
        Ok(item) if item.size == request.size_bytes => TransferOutcome::Completed {
            remote_id: item.id,
            bytes_sent: request.size_bytes,
        },
        Ok(item) => {
            warn!(
                name = request.remote_name,
                local_size = request.size_bytes,
                remote_size = item.size,
                "Remote size does not match local file"
            );
            TransferOutcome::failed(
                FailureKind::SizeMismatch,
                format!(
                    "remote size {} != local size {}",
                    item.size, request.size_bytes
                ),
            )
        }
        Err(e) => e.into_outcome(),
    }
}
