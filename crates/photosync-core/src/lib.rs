//! PhotoSync Core - Domain types, ports and configuration
//!
//! This crate is the hexagonal core shared by every other PhotoSync crate:
//! - **Domain types** - `CacheEntry`, `WatermarkRecord`, `TransferOutcome`, `RunResult`
//! - **Port definitions** - `IDriveClient`, `IAuthenticator`, `IUploadCache`, `IWatermarkStore`
//! - **Configuration** - YAML-backed `Config` with upload and download profiles
//! - **Retry policy** - bounded exponential backoff shared by folder creation
//!   and chunked uploads
//!
//! # Architecture
//!
//! Domain and ports carry no I/O. Adapter crates (`photosync-cache`,
//! `photosync-graph`) implement the ports; `photosync-sync` drives them.

pub mod config;
pub mod domain;
pub mod ports;
pub mod retry;
