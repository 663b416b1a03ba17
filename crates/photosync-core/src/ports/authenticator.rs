//! Authenticator port
//!
//! Access tokens flow from an [`IAuthenticator`] into the drive client
//! factory; nothing else in the engine holds credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::AuthError;

/// OAuth tokens stored for a profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tokens {
    /// Bearer token for API requests
    pub access_token: String,
    /// Token for refreshing the access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl Tokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within the given duration
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }
}

/// Port for obtaining access tokens
///
/// Implementations may block on an interactive login; callers bound the
/// call with their own timeout.
#[async_trait::async_trait]
pub trait IAuthenticator: Send + Sync {
    /// Returns a valid access token for the named profile
    async fn get_access_token(&self, profile: &str) -> Result<String, AuthError>;
}
