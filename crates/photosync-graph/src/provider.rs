//! GraphDriveClient - IDriveClient implementation for Microsoft Graph API
//!
//! Wraps the [`GraphClient`] and delegates to the items and upload modules
//! to fulfil the [`IDriveClient`] port contract. One client serves one
//! profile. When Graph answers 401, the client asks the profile's
//! [`IAuthenticator`] for a renewed token and repeats the request once, so
//! runs that outlive an access token keep going.
//! [`GraphDriveClientFactory`] builds clients from a shared HTTP client so
//! connections are pooled across profiles.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{info, warn};

use photosync_core::domain::{DriveError, RemotePath};
use photosync_core::ports::{
    ChunkAck, ConflictBehavior, IAuthenticator, IDriveClient, IDriveClientFactory, RemoteItem,
    UploadSession,
};

use crate::client::{build_http_client, GraphClient, GRAPH_BASE_URL};
use crate::items;
use crate::upload;

/// Source of renewed access tokens for one profile
#[derive(Clone)]
struct TokenRenewal {
    profile: String,
    authenticator: Arc<dyn IAuthenticator>,
}

/// Microsoft Graph implementation of [`IDriveClient`]
#[derive(Clone)]
pub struct GraphDriveClient {
    client: GraphClient,
    renewal: Option<TokenRenewal>,
}

impl GraphDriveClient {
    /// Creates a client that never renews its token
    pub fn new(client: GraphClient) -> Self {
        Self {
            client,
            renewal: None,
        }
    }

    /// Renews rejected tokens for `profile` through `authenticator`
    pub fn with_token_renewal(
        mut self,
        profile: impl Into<String>,
        authenticator: Arc<dyn IAuthenticator>,
    ) -> Self {
        self.renewal = Some(TokenRenewal {
            profile: profile.into(),
            authenticator,
        });
        self
    }

    /// Returns the underlying Graph client
    pub fn client(&self) -> &GraphClient {
        &self.client
    }

    /// Fetches a new token; false if none differs from the rejected one
    async fn renew_token(&self) -> bool {
        let Some(renewal) = &self.renewal else {
            return false;
        };
        match renewal.authenticator.get_access_token(&renewal.profile).await {
            Ok(token) if token != self.client.access_token() => {
                info!(profile = %renewal.profile, "Access token renewed");
                self.client.set_access_token(token);
                true
            }
            Ok(_) => {
                warn!(profile = %renewal.profile, "Token rejected but no newer token is available");
                false
            }
            Err(e) => {
                warn!(profile = %renewal.profile, error = %e, "Cannot renew access token");
                false
            }
        }
    }

    /// Runs `op`, repeating it once with a renewed token after a 401
    async fn authorized<T, F, Fut>(&self, op: F) -> Result<T, DriveError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, DriveError>>,
    {
        match op().await {
            Err(DriveError::Unauthorized(detail)) => {
                if self.renew_token().await {
                    op().await
                } else {
                    Err(DriveError::Unauthorized(detail))
                }
            }
            other => other,
        }
    }
}

#[async_trait::async_trait]
impl IDriveClient for GraphDriveClient {
    async fn get_item_by_path(&self, path: &RemotePath) -> Result<Option<RemoteItem>, DriveError> {
        self.authorized(|| items::get_item_by_path(&self.client, path))
            .await
    }

    async fn get_child(
        &self,
        folder_id: &str,
        name: &str,
    ) -> Result<Option<RemoteItem>, DriveError> {
        self.authorized(|| items::get_child(&self.client, folder_id, name))
            .await
    }

    async fn list_folder(&self, folder_id: &str) -> Result<Vec<RemoteItem>, DriveError> {
        self.authorized(|| items::list_children(&self.client, folder_id))
            .await
    }

    async fn create_folder(&self, parent_id: &str, name: &str) -> Result<RemoteItem, DriveError> {
        self.authorized(|| items::create_folder(&self.client, parent_id, name))
            .await
    }

    async fn upload_simple(
        &self,
        folder_id: &str,
        name: &str,
        data: Vec<u8>,
        conflict: ConflictBehavior,
    ) -> Result<RemoteItem, DriveError> {
        self.authorized(|| upload::upload_small(&self.client, folder_id, name, data.clone(), conflict))
            .await
    }

    async fn upload_session_start(
        &self,
        folder_id: &str,
        name: &str,
        conflict: ConflictBehavior,
    ) -> Result<UploadSession, DriveError> {
        self.authorized(|| upload::create_upload_session(&self.client, folder_id, name, conflict))
            .await
    }

    async fn upload_session_append(
        &self,
        session: &UploadSession,
        offset: u64,
        total: u64,
        chunk: Vec<u8>,
    ) -> Result<ChunkAck, DriveError> {
        // Session URLs are pre-authenticated
        upload::upload_chunk(&self.client, session, offset, total, chunk).await
    }

    async fn upload_session_cancel(&self, session: &UploadSession) -> Result<(), DriveError> {
        upload::cancel_upload_session(&self.client, session).await
    }

    async fn delete_item(&self, item_id: &str) -> Result<(), DriveError> {
        self.authorized(|| items::delete_item(&self.client, item_id))
            .await
    }

    async fn camera_roll_items(&self) -> Result<Vec<RemoteItem>, DriveError> {
        self.authorized(|| items::list_camera_roll(&self.client))
            .await
    }

    async fn download_item(&self, item_id: &str, destination: &Path) -> Result<u64, DriveError> {
        self.authorized(|| items::download_to_file(&self.client, item_id, destination))
            .await
    }
}

// ============================================================================
// Factory
// ============================================================================

/// Builds [`GraphDriveClient`]s that share one HTTP connection pool
#[derive(Clone)]
pub struct GraphDriveClientFactory {
    http: Client,
    base_url: String,
}

impl GraphDriveClientFactory {
    /// Creates a factory whose clients time out after `request_timeout`
    pub fn new(request_timeout: Duration) -> Result<Self> {
        let http = build_http_client(request_timeout).context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: GRAPH_BASE_URL.to_string(),
        })
    }

    /// Points created clients at a different API root (useful for testing)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl IDriveClientFactory for GraphDriveClientFactory {
    fn create(
        &self,
        profile: &str,
        access_token: String,
        authenticator: Arc<dyn IAuthenticator>,
    ) -> Arc<dyn IDriveClient> {
        let client = GraphClient::with_base_url(access_token, self.base_url.clone())
            .with_http_client(self.http.clone());
        Arc::new(GraphDriveClient::new(client).with_token_renewal(profile, authenticator))
    }
}
