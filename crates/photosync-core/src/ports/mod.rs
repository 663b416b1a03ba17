//! Port definitions (hexagonal architecture interfaces)
//!
//! Ports are the interfaces the sync engine depends on; their
//! implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IDriveClient`] - Remote drive operations (Microsoft Graph)
//! - [`IAuthenticator`] - Access tokens per profile
//! - [`IUploadCache`] - Per-profile record of reconciled files
//! - [`IWatermarkStore`] - Per-profile incremental scan watermark

pub mod authenticator;
pub mod drive_client;
pub mod upload_cache;
pub mod watermark_store;

pub use authenticator::{IAuthenticator, Tokens};
pub use drive_client::{
    ChunkAck, ConflictBehavior, IDriveClient, IDriveClientFactory, RemoteItem, UploadSession,
};
pub use upload_cache::{BuildStats, IUploadCache, LocalFile, RemoteFile};
pub use watermark_store::IWatermarkStore;
