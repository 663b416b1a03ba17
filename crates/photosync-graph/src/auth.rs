//! OAuth2 device-code authentication for Microsoft Graph API
//!
//! Implements [`IAuthenticator`] for personal Microsoft accounts (consumers
//! tenant). For each profile the authenticator:
//!
//! 1. Reuses the stored access token if it is valid for at least 5 more minutes
//! 2. Otherwise refreshes it with the stored refresh token
//! 3. Otherwise runs the device-code flow, bounded by the configured timeout
//!
//! New tokens are written back to the profile's [`TokenStore`].

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    ClientId, DeviceAuthorizationUrl, DeviceCodeErrorResponse, DeviceCodeErrorResponseType,
    EndpointNotSet, EndpointSet, RefreshToken, RequestTokenError, Scope,
    StandardDeviceAuthorizationResponse, TokenResponse, TokenUrl,
};
use tracing::{info, warn};

use photosync_core::domain::AuthError;
use photosync_core::ports::{IAuthenticator, Tokens};

use crate::token_store::TokenStore;

/// Device authorization endpoint (consumers tenant)
const DEVICE_CODE_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/devicecode";

/// Token endpoint (consumers tenant)
const TOKEN_URL: &str = "https://login.microsoftonline.com/consumers/oauth2/v2.0/token";

/// Scopes requested for OneDrive access
const SCOPES: &[&str] = &["https://graph.microsoft.com/Files.ReadWrite", "offline_access"];

/// Stored access tokens expiring sooner than this are refreshed
const REUSE_MARGIN_MINUTES: i64 = 5;

type DeviceClient =
    BasicClient<EndpointNotSet, EndpointSet, EndpointNotSet, EndpointNotSet, EndpointSet>;

/// Device-code authenticator with per-profile token storage
pub struct DeviceCodeAuthenticator {
    client_id: String,
    store: Arc<dyn TokenStore>,
    timeout: Duration,
    http: reqwest::Client,
    device_code_url: String,
    token_url: String,
}

impl DeviceCodeAuthenticator {
    /// Creates an authenticator for the given Azure AD application
    ///
    /// `timeout` bounds the interactive device-code login.
    pub fn new(
        client_id: impl Into<String>,
        store: Arc<dyn TokenStore>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        // Token endpoints must not redirect
        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| AuthError::Flow(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client_id: client_id.into(),
            store,
            timeout,
            http,
            device_code_url: DEVICE_CODE_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
        })
    }

    /// Overrides the identity endpoints (useful for testing)
    pub fn with_endpoints(
        mut self,
        device_code_url: impl Into<String>,
        token_url: impl Into<String>,
    ) -> Self {
        self.device_code_url = device_code_url.into();
        self.token_url = token_url.into();
        self
    }

    fn oauth_client(&self) -> Result<DeviceClient, AuthError> {
        let device_url = DeviceAuthorizationUrl::new(self.device_code_url.clone())
            .map_err(|e| AuthError::Flow(format!("Invalid device code URL: {e}")))?;
        let token_url = TokenUrl::new(self.token_url.clone())
            .map_err(|e| AuthError::Flow(format!("Invalid token URL: {e}")))?;

        Ok(BasicClient::new(ClientId::new(self.client_id.clone()))
            .set_device_authorization_url(device_url)
            .set_token_uri(token_url))
    }

    /// Returns valid tokens for `profile`, logging in interactively if needed
    ///
    /// With `force`, stored tokens are ignored and the device-code flow runs.
    pub async fn login(&self, profile: &str, force: bool) -> Result<Tokens, AuthError> {
        if !force {
            if let Some(tokens) = self.stored_tokens(profile) {
                if !tokens.expires_within(chrono::Duration::minutes(REUSE_MARGIN_MINUTES)) {
                    info!(profile, "Reusing cached access token");
                    return Ok(tokens);
                }

                if let Some(refresh_token) = tokens.refresh_token.as_deref() {
                    info!(profile, "Access token expired, refreshing");
                    match self.refresh(refresh_token).await {
                        Ok(fresh) => {
                            self.store.save(profile, &fresh)?;
                            return Ok(fresh);
                        }
                        Err(e) => warn!(profile, error = %e, "Refresh failed, need to re-authenticate"),
                    }
                }
            }
        }

        info!(profile, "No valid token found, starting device code flow");
        let tokens = match tokio::time::timeout(self.timeout, self.device_flow(profile)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(
                    profile,
                    timeout_secs = self.timeout.as_secs(),
                    "Authentication timeout expired"
                );
                return Err(AuthError::Timeout(self.timeout.as_secs()));
            }
        };

        self.store.save(profile, &tokens)?;
        info!(profile, "Authentication successful");
        Ok(tokens)
    }

    /// Removes the profile's stored tokens
    pub fn logout(&self, profile: &str) -> Result<(), AuthError> {
        self.store.clear(profile)
    }

    fn stored_tokens(&self, profile: &str) -> Option<Tokens> {
        match self.store.load(profile) {
            Ok(tokens) => tokens,
            Err(e) => {
                warn!(profile, error = %e, "Ignoring unreadable stored tokens");
                None
            }
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<Tokens, AuthError> {
        let client = self.oauth_client()?;
        let refresh_token_value = RefreshToken::new(refresh_token.to_string());
        let mut request = client.exchange_refresh_token(&refresh_token_value);
        for scope in SCOPES {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }

        let response = request
            .request_async(&self.http)
            .await
            .map_err(|e| match e {
                RequestTokenError::ServerResponse(resp) => AuthError::Denied(resp.to_string()),
                other => AuthError::Flow(other.to_string()),
            })?;

        info!("Token refreshed successfully");
        Ok(tokens_from_response(&response, Some(refresh_token)))
    }

    async fn device_flow(&self, profile: &str) -> Result<Tokens, AuthError> {
        let client = self.oauth_client()?;
        let mut request = client.exchange_device_code();
        for scope in SCOPES {
            request = request.add_scope(Scope::new((*scope).to_string()));
        }

        let details: StandardDeviceAuthorizationResponse = request
            .request_async(&self.http)
            .await
            .map_err(|e| AuthError::Flow(format!("Failed to initiate device flow: {e}")))?;

        info!(
            profile,
            timeout_secs = self.timeout.as_secs(),
            "AUTHENTICATION REQUIRED: open {} and enter code {}",
            details.verification_uri().as_str(),
            details.user_code().secret()
        );

        let response = client
            .exchange_device_access_token(&details)
            .request_async(&self.http, tokio::time::sleep, Some(self.timeout))
            .await
            .map_err(|e| device_error(e, self.timeout))?;

        Ok(tokens_from_response(&response, None))
    }
}

fn device_error<RE>(err: RequestTokenError<RE, DeviceCodeErrorResponse>, timeout: Duration) -> AuthError
where
    RE: std::error::Error + 'static,
{
    match err {
        RequestTokenError::ServerResponse(resp) => match resp.error() {
            DeviceCodeErrorResponseType::AccessDenied => AuthError::Denied(resp.to_string()),
            DeviceCodeErrorResponseType::ExpiredToken => AuthError::Timeout(timeout.as_secs()),
            _ => AuthError::Flow(resp.to_string()),
        },
        other => AuthError::Flow(other.to_string()),
    }
}

fn tokens_from_response(response: &BasicTokenResponse, previous_refresh: Option<&str>) -> Tokens {
    let expires_at = response
        .expires_in()
        .map(|d| Utc::now() + chrono::Duration::seconds(d.as_secs() as i64))
        .unwrap_or_else(|| Utc::now() + chrono::Duration::hours(1));

    Tokens {
        access_token: response.access_token().secret().to_string(),
        refresh_token: response
            .refresh_token()
            .map(|t| t.secret().to_string())
            .or_else(|| previous_refresh.map(str::to_string)),
        expires_at,
    }
}

#[async_trait::async_trait]
impl IAuthenticator for DeviceCodeAuthenticator {
    async fn get_access_token(&self, profile: &str) -> Result<String, AuthError> {
        self.login(profile, false).await.map(|t| t.access_token)
    }
}
