//! DriveItem operations for Microsoft Graph API (OneDrive)
//!
//! - Lookup by absolute path or by parent id + name
//! - Paged folder listing (`@odata.nextLink`)
//! - Folder creation and item deletion
//! - Camera roll listing and streaming downloads
//!
//! ## Microsoft Graph API References
//!
//! - [Get item](https://learn.microsoft.com/en-us/graph/api/driveitem-get)
//! - [List children](https://learn.microsoft.com/en-us/graph/api/driveitem-list-children)
//! - [Special folders](https://learn.microsoft.com/en-us/graph/api/drive-get-specialfolder)

use std::path::Path;

use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::Method;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use photosync_core::domain::{DriveError, RemotePath};
use photosync_core::ports::RemoteItem;

use crate::client::{classify_transport, GraphClient};

/// Page size requested for children listings
const PAGE_SIZE: u32 = 200;

// ============================================================================
// Graph API DriveItem response types
// ============================================================================

/// A DriveItem as returned by the Microsoft Graph API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GraphDriveItem {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) size: Option<u64>,
    pub(crate) created_date_time: Option<DateTime<Utc>>,
    pub(crate) last_modified_date_time: Option<DateTime<Utc>>,
    /// Present if the item is a folder
    pub(crate) folder: Option<serde_json::Value>,
    /// Present for photos carrying capture metadata
    pub(crate) photo: Option<PhotoFacet>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhotoFacet {
    pub(crate) taken_date_time: Option<DateTime<Utc>>,
}

impl From<GraphDriveItem> for RemoteItem {
    fn from(item: GraphDriveItem) -> Self {
        RemoteItem {
            is_folder: item.folder.is_some(),
            size: item.size.unwrap_or(0),
            created: item.created_date_time,
            last_modified: item.last_modified_date_time,
            taken: item.photo.and_then(|p| p.taken_date_time),
            id: item.id,
            name: item.name,
        }
    }
}

/// One page of a children listing
#[derive(Debug, Deserialize)]
struct ChildrenPage {
    #[serde(default)]
    value: Vec<GraphDriveItem>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

// ============================================================================
// Path helpers
// ============================================================================

/// Percent-encodes every segment of a remote path, keeping the separators
pub(crate) fn encode_path(path: &RemotePath) -> String {
    path.segments()
        .map(|s| format!("/{}", urlencoding::encode(s)))
        .collect()
}

/// API path addressing an item by its absolute path
pub(crate) fn item_by_path_url(path: &RemotePath) -> String {
    if path.is_root() {
        "/me/drive/root".to_string()
    } else {
        format!("/me/drive/root:{}", encode_path(path))
    }
}

/// API path addressing `name` inside the folder `folder_id`
pub(crate) fn child_url(folder_id: &str, name: &str, suffix: Option<&str>) -> String {
    let base = format!(
        "/me/drive/items/{}:/{}",
        urlencoding::encode(folder_id),
        urlencoding::encode(name)
    );
    match suffix {
        Some(suffix) => format!("{base}:/{suffix}"),
        None => base,
    }
}

fn not_found_as_none<T>(result: Result<T, DriveError>) -> Result<Option<T>, DriveError> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(DriveError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

// ============================================================================
// Lookups and listings
// ============================================================================

/// Fetches an item by absolute path; `Ok(None)` on 404
pub async fn get_item_by_path(
    client: &GraphClient,
    path: &RemotePath,
) -> Result<Option<RemoteItem>, DriveError> {
    let url = item_by_path_url(path);
    debug!(path = %path, "Looking up item by path");
    let result: Result<GraphDriveItem, _> = client
        .send_json(client.request(Method::GET, &url), "get item by path")
        .await;
    Ok(not_found_as_none(result)?.map(RemoteItem::from))
}

/// Fetches a direct child of a folder by name; `Ok(None)` on 404
pub async fn get_child(
    client: &GraphClient,
    folder_id: &str,
    name: &str,
) -> Result<Option<RemoteItem>, DriveError> {
    let url = child_url(folder_id, name, None);
    let result: Result<GraphDriveItem, _> = client
        .send_json(client.request(Method::GET, &url), "get child")
        .await;
    Ok(not_found_as_none(result)?.map(RemoteItem::from))
}

/// Collects every page starting at `first_path`
async fn list_paged(
    client: &GraphClient,
    first_path: &str,
    operation: &str,
) -> Result<Vec<RemoteItem>, DriveError> {
    let mut page: ChildrenPage = client
        .send_json(client.request(Method::GET, first_path), operation)
        .await?;
    let mut items: Vec<RemoteItem> = page.value.drain(..).map(RemoteItem::from).collect();
    let mut pages = 1u32;

    while let Some(next_link) = page.next_link.take() {
        pages += 1;
        debug!(operation, page = pages, "Following nextLink");
        page = client
            .send_json(client.get_absolute(&next_link), operation)
            .await?;
        items.extend(page.value.drain(..).map(RemoteItem::from));
    }

    debug!(operation, pages, items = items.len(), "Listing complete");
    Ok(items)
}

/// Lists every child of a folder
pub async fn list_children(
    client: &GraphClient,
    folder_id: &str,
) -> Result<Vec<RemoteItem>, DriveError> {
    let path = format!(
        "/me/drive/items/{}/children?$top={}",
        urlencoding::encode(folder_id),
        PAGE_SIZE
    );
    list_paged(client, &path, "list children").await
}

/// Lists the special camera roll folder
pub async fn list_camera_roll(client: &GraphClient) -> Result<Vec<RemoteItem>, DriveError> {
    let path = format!("/me/drive/special/cameraroll/children?$top={PAGE_SIZE}");
    list_paged(client, &path, "list camera roll").await
}

// ============================================================================
// Mutations
// ============================================================================

/// Creates a folder; a name clash fails with [`DriveError::Conflict`]
pub async fn create_folder(
    client: &GraphClient,
    parent_id: &str,
    name: &str,
) -> Result<RemoteItem, DriveError> {
    let path = format!(
        "/me/drive/items/{}/children",
        urlencoding::encode(parent_id)
    );
    let body = serde_json::json!({
        "name": name,
        "folder": {},
        "@microsoft.graph.conflictBehavior": "fail",
    });

    let item: GraphDriveItem = client
        .send_json(
            client.request(Method::POST, &path).json(&body),
            "create folder",
        )
        .await?;
    debug!(parent_id, name, id = %item.id, "Created folder");
    Ok(item.into())
}

/// Deletes an item (moves it to the recycle bin)
pub async fn delete_item(client: &GraphClient, item_id: &str) -> Result<(), DriveError> {
    let path = format!("/me/drive/items/{}", urlencoding::encode(item_id));
    client
        .send(client.request(Method::DELETE, &path), "delete item")
        .await?;
    debug!(item_id, "Deleted remote item");
    Ok(())
}

// ============================================================================
// Downloads
// ============================================================================

/// Streams an item's content into `destination`, returning bytes written
///
/// The Graph API answers with a redirect to a pre-authenticated URL, which
/// reqwest follows. A partially written file is removed on failure.
pub async fn download_to_file(
    client: &GraphClient,
    item_id: &str,
    destination: &Path,
) -> Result<u64, DriveError> {
    let path = format!("/me/drive/items/{}/content", urlencoding::encode(item_id));
    let response = client
        .send(client.request(Method::GET, &path), "download item")
        .await?;

    let result = write_stream(response, destination).await;
    if result.is_err() {
        let _ = tokio::fs::remove_file(destination).await;
    }
    result
}

async fn write_stream(response: reqwest::Response, destination: &Path) -> Result<u64, DriveError> {
    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| local_io(destination, e))?;

    let mut written = 0u64;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| classify_transport(&e))?;
        file.write_all(&chunk)
            .await
            .map_err(|e| local_io(destination, e))?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| local_io(destination, e))?;

    debug!(path = %destination.display(), bytes = written, "Download written");
    Ok(written)
}

fn local_io(path: &Path, e: std::io::Error) -> DriveError {
    DriveError::InvalidResponse(format!("cannot write {}: {e}", path.display()))
}
