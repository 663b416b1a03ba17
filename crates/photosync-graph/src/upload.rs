//! Upload operations for Microsoft Graph API (OneDrive)
//!
//! - [`upload_small`] - Single PUT for files up to 4 MiB
//! - [`create_upload_session`] - Opens a resumable upload session
//! - [`upload_chunk`] - Sends one byte range to a session
//! - [`cancel_upload_session`] - Abandons a session
//!
//! Chunk retries and offset bookkeeping belong to the caller; every function
//! here performs exactly one HTTP request.
//!
//! ## Microsoft Graph API References
//!
//! - [Upload small files](https://learn.microsoft.com/en-us/graph/api/driveitem-put-content)
//! - [Upload large files](https://learn.microsoft.com/en-us/graph/api/driveitem-createuploadsession)

use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use tracing::debug;

use photosync_core::domain::DriveError;
use photosync_core::ports::{ChunkAck, ConflictBehavior, RemoteItem, UploadSession};

use crate::client::{classify_status, classify_transport, GraphClient};
use crate::items::{child_url, GraphDriveItem};

/// Response from creating an upload session
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadSessionResponse {
    upload_url: String,
    expiration_date_time: Option<DateTime<Utc>>,
}

/// Response to an intermediate chunk (HTTP 202)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChunkAcceptedResponse {
    #[serde(default)]
    next_expected_ranges: Vec<String>,
}

/// Start offset of the first `"start-end"` range
fn first_range_start(ranges: &[String]) -> Option<u64> {
    ranges
        .first()
        .and_then(|r| r.split('-').next())
        .and_then(|start| start.trim().parse().ok())
}

// ============================================================================
// upload_small
// ============================================================================

/// Uploads a small file in a single PUT request
///
/// `PUT /me/drive/items/{folder}:/{name}:/content?@microsoft.graph.conflictBehavior=...`
pub async fn upload_small(
    client: &GraphClient,
    folder_id: &str,
    name: &str,
    data: Vec<u8>,
    conflict: ConflictBehavior,
) -> Result<RemoteItem, DriveError> {
    let path = format!(
        "{}?@microsoft.graph.conflictBehavior={}",
        child_url(folder_id, name, Some("content")),
        conflict.as_str()
    );
    let len = data.len();
    debug!(name, bytes = len, conflict = conflict.as_str(), "Uploading small file");

    let item: GraphDriveItem = client
        .send_json(
            client
                .request(Method::PUT, &path)
                .header("Content-Type", "application/octet-stream")
                .body(data),
            "simple upload",
        )
        .await?;

    debug!(id = %item.id, name = %item.name, "Small upload completed");
    Ok(item.into())
}

// ============================================================================
// Upload sessions
// ============================================================================

/// Creates a resumable upload session
///
/// `POST /me/drive/items/{folder}:/{name}:/createUploadSession`
pub async fn create_upload_session(
    client: &GraphClient,
    folder_id: &str,
    name: &str,
    conflict: ConflictBehavior,
) -> Result<UploadSession, DriveError> {
    let path = child_url(folder_id, name, Some("createUploadSession"));
    let body = serde_json::json!({
        "item": {
            "@microsoft.graph.conflictBehavior": conflict.as_str(),
            "name": name,
        }
    });

    let response: UploadSessionResponse = client
        .send_json(
            client.request(Method::POST, &path).json(&body),
            "create upload session",
        )
        .await?;

    debug!(name, expires = ?response.expiration_date_time, "Upload session created");
    Ok(UploadSession {
        upload_url: response.upload_url,
        expires_at: response.expiration_date_time,
    })
}

/// Uploads bytes `offset..offset + chunk.len()` of a `total`-byte file
///
/// The session URL is pre-authenticated, so no Authorization header is sent.
/// HTTP 202 yields [`ChunkAck::Accepted`] with the next expected offset;
/// HTTP 200/201 yields [`ChunkAck::Completed`] with the created item.
pub async fn upload_chunk(
    client: &GraphClient,
    session: &UploadSession,
    offset: u64,
    total: u64,
    chunk: Vec<u8>,
) -> Result<ChunkAck, DriveError> {
    let chunk_len = chunk.len() as u64;
    if chunk_len == 0 {
        return Err(DriveError::InvalidResponse(
            "refusing to send an empty chunk".to_string(),
        ));
    }
    let content_range = format!("bytes {}-{}/{}", offset, offset + chunk_len - 1, total);
    debug!(range = %content_range, "Uploading chunk");

    let response = client
        .http_client()
        .put(&session.upload_url)
        .header("Content-Length", chunk_len.to_string())
        .header("Content-Range", &content_range)
        .body(chunk)
        .send()
        .await
        .map_err(|e| classify_transport(&e))?;

    let status = response.status();
    let body = response.bytes().await.map_err(|e| classify_transport(&e))?;

    match status {
        StatusCode::ACCEPTED => {
            let accepted: ChunkAcceptedResponse =
                serde_json::from_slice(&body).unwrap_or(ChunkAcceptedResponse {
                    next_expected_ranges: Vec::new(),
                });
            let next_offset =
                first_range_start(&accepted.next_expected_ranges).unwrap_or(offset + chunk_len);
            Ok(ChunkAck::Accepted { next_offset })
        }
        StatusCode::OK | StatusCode::CREATED => {
            let item: GraphDriveItem = serde_json::from_slice(&body).map_err(|e| {
                DriveError::InvalidResponse(format!("failed to parse final chunk response: {e}"))
            })?;
            debug!(id = %item.id, "Upload session completed");
            Ok(ChunkAck::Completed(item.into()))
        }
        other => Err(classify_status(other, &String::from_utf8_lossy(&body))),
    }
}

/// Deletes an upload session so the service discards stored ranges
pub async fn cancel_upload_session(
    client: &GraphClient,
    session: &UploadSession,
) -> Result<(), DriveError> {
    let response = client
        .http_client()
        .delete(&session.upload_url)
        .send()
        .await
        .map_err(|e| classify_transport(&e))?;

    let status = response.status();
    if status.is_success() || status == StatusCode::NOT_FOUND {
        debug!("Upload session cancelled");
        Ok(())
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, &body))
    }
}
