//! Microsoft Graph API client
//!
//! Provides a typed HTTP client for the Microsoft Graph API. Handles
//! authentication headers, endpoint construction and the mapping of HTTP
//! failures onto [`DriveError`] classes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use reqwest::Method;
//! use photosync_graph::client::GraphClient;
//!
//! # async fn example() -> Result<(), photosync_core::domain::DriveError> {
//! let client = GraphClient::new("access-token-here");
//! let response = client
//!     .send(client.request(Method::GET, "/me/drive/root"), "get root")
//!     .await?;
//! println!("status {}", response.status());
//! # Ok(())
//! # }
//! ```

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use photosync_core::domain::DriveError;

/// Base URL for Microsoft Graph API v1.0
pub const GRAPH_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

// ============================================================================
// Error body
// ============================================================================

/// `{"error": {"code": "...", "message": "..."}}`
#[derive(Debug, Deserialize)]
struct GraphErrorBody {
    error: GraphErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GraphErrorDetail {
    code: Option<String>,
    message: Option<String>,
}

/// Short description of an error response body
fn describe_error_body(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<GraphErrorBody>(body) {
        Ok(parsed) => format!(
            "{} {}: {}",
            status.as_u16(),
            parsed.error.code.unwrap_or_default(),
            parsed.error.message.unwrap_or_default()
        ),
        Err(_) if body.is_empty() => status.to_string(),
        Err(_) => format!("{}: {}", status.as_u16(), body.chars().take(200).collect::<String>()),
    }
}

/// Maps a non-success HTTP status onto a [`DriveError`] class
pub fn classify_status(status: StatusCode, body: &str) -> DriveError {
    let detail = describe_error_body(status, body);
    match status.as_u16() {
        401 => DriveError::Unauthorized(detail),
        403 | 507 => DriveError::QuotaOrPermission(detail),
        404 => DriveError::NotFound(detail),
        409 => DriveError::Conflict(detail),
        408 | 429 => DriveError::Transient(detail),
        s if s >= 500 => DriveError::Transient(detail),
        _ => DriveError::InvalidResponse(detail),
    }
}

/// Maps a transport-level reqwest error onto a [`DriveError`] class
pub fn classify_transport(err: &reqwest::Error) -> DriveError {
    if err.is_decode() {
        DriveError::InvalidResponse(err.to_string())
    } else if err.is_builder() {
        DriveError::InvalidResponse(format!("invalid request: {err}"))
    } else {
        // timeouts, connect failures, reset connections, truncated bodies
        DriveError::Transient(err.to_string())
    }
}

/// Builds the shared HTTP client with a per-request timeout
pub fn build_http_client(request_timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(request_timeout)
        .connect_timeout(request_timeout.min(Duration::from_secs(30)))
        .build()
}

// ============================================================================
// GraphClient
// ============================================================================

/// HTTP client for Microsoft Graph API calls
///
/// Wraps `reqwest::Client` with authentication headers and base URL
/// construction for the Microsoft Graph API. Clones share the access token,
/// so a renewed token reaches every clone.
#[derive(Clone)]
pub struct GraphClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for API requests
    base_url: String,
    /// Current OAuth2 access token
    access_token: Arc<RwLock<String>>,
}

impl GraphClient {
    /// Creates a new GraphClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_url(access_token, GRAPH_BASE_URL)
    }

    /// Creates a new GraphClient with a custom base URL (useful for testing)
    pub fn with_base_url(access_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: Arc::new(RwLock::new(access_token.into())),
        }
    }

    /// Replaces the underlying HTTP client (e.g. one built with a timeout)
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.client = client;
        self
    }

    /// Returns the current access token
    pub fn access_token(&self) -> String {
        self.access_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&self, token: impl Into<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(PoisonError::into_inner) = token.into();
        debug!("Updated GraphClient access token");
    }

    /// Returns the base URL for API requests
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the underlying reqwest Client
    ///
    /// Used for absolute URLs (`@odata.nextLink`, upload session URLs).
    pub fn http_client(&self) -> &Client {
        &self.client
    }

    /// Creates an authenticated request builder for the given method and path
    ///
    /// `path` is relative to the base URL, e.g. `/me/drive/root`.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .request(method, &url)
            .bearer_auth(self.access_token())
    }

    /// Creates an authenticated GET for an absolute URL such as a nextLink
    pub fn get_absolute(&self, url: &str) -> RequestBuilder {
        self.client.get(url).bearer_auth(self.access_token())
    }

    /// Sends a request and classifies any failure
    ///
    /// Returns the response only for 2xx statuses.
    pub async fn send(&self, request: RequestBuilder, operation: &str) -> Result<Response, DriveError> {
        let response = request.send().await.map_err(|e| {
            debug!(operation, error = %e, "Request failed before a response");
            classify_transport(&e)
        })?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let err = classify_status(status, &body);
        debug!(operation, status = status.as_u16(), error = %err, "Graph request rejected");
        Err(err)
    }

    /// Sends a request and deserializes the JSON body
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<T, DriveError> {
        let response = self.send(request, operation).await?;
        let bytes = response.bytes().await.map_err(|e| classify_transport(&e))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            DriveError::InvalidResponse(format!("{operation}: failed to parse response: {e}"))
        })
    }
}
