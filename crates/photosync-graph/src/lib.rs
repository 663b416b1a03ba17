//! PhotoSync Graph - Microsoft Graph API adapter
//!
//! Provides async access to OneDrive for:
//! - Device-code OAuth2 authentication with per-profile token storage
//! - Folder lookup, listing and creation
//! - Simple and resumable (chunked) uploads
//! - Camera roll listing and streaming downloads
//!
//! ## Modules
//!
//! - [`auth`] - Device-code flow implementing `IAuthenticator`
//! - [`token_store`] - File and keyring token persistence
//! - [`client`] - HTTP client with status classification
//! - [`items`] - DriveItem lookup, listing, folders, downloads
//! - [`upload`] - Simple uploads and upload sessions
//! - [`provider`] - `IDriveClient` implementation and factory

pub mod auth;
pub mod client;
pub mod items;
pub mod provider;
pub mod token_store;
pub mod upload;

pub use auth::DeviceCodeAuthenticator;
pub use client::GraphClient;
pub use provider::{GraphDriveClient, GraphDriveClientFactory};
pub use token_store::{FileTokenStore, KeyringTokenStore, TokenStore};
