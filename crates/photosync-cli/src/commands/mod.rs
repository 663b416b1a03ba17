//! Subcommands and the wiring they share
//!
//! [`AppContext`] turns the loaded configuration into adapters: the token
//! store selected by `auth.token_store`, the device-code authenticator and
//! the Graph drive client factory.

pub mod auth;
pub mod cache;
pub mod sync;
pub mod upload;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::info;

use photosync_core::config::{Config, TokenStoreKind, UploadProfile};
use photosync_graph::{
    DeviceCodeAuthenticator, FileTokenStore, GraphDriveClientFactory, KeyringTokenStore,
    TokenStore,
};
use photosync_sync::ProfileRunner;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

/// Configuration plus output settings for one invocation
pub struct AppContext {
    pub config: Config,
    pub format: OutputFormat,
}

impl AppContext {
    pub fn new(config: Config, format: OutputFormat) -> Self {
        Self { config, format }
    }

    pub fn formatter(&self) -> Box<dyn OutputFormatter> {
        get_formatter(self.format == OutputFormat::Json)
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    fn token_store(&self) -> Arc<dyn TokenStore> {
        match self.config.auth.token_store {
            TokenStoreKind::File => Arc::new(FileTokenStore::new(&self.config.data_dir)),
            TokenStoreKind::Keyring => Arc::new(KeyringTokenStore),
        }
    }

    pub fn authenticator(&self) -> Result<Arc<DeviceCodeAuthenticator>> {
        let authenticator = DeviceCodeAuthenticator::new(
            self.config.client_id.clone(),
            self.token_store(),
            self.config.auth_timeout(),
        )?;
        Ok(Arc::new(authenticator))
    }

    pub fn runner(&self) -> Result<ProfileRunner> {
        let drives = GraphDriveClientFactory::new(self.config.request_timeout())?;
        Ok(ProfileRunner::new(
            self.authenticator()?,
            Arc::new(drives),
            &self.config,
        ))
    }

    /// The named upload profile, or all of them
    pub fn upload_profiles(&self, name: Option<&str>) -> Result<Vec<UploadProfile>> {
        match name {
            Some(name) => Ok(vec![self.upload_profile(name)?.clone()]),
            None => Ok(self.config.upload_profiles.clone()),
        }
    }

    pub fn upload_profile(&self, name: &str) -> Result<&UploadProfile> {
        self.config
            .upload_profile(name)
            .with_context(|| format!("No upload profile named '{name}' in config"))
    }

    /// Every profile name from both profile lists, without duplicates
    pub fn all_profile_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        let configured = self
            .config
            .profiles
            .iter()
            .map(|p| &p.name)
            .chain(self.config.upload_profiles.iter().map(|p| &p.name));
        for name in configured {
            if !names.contains(name) {
                names.push(name.clone());
            }
        }
        names
    }
}

/// Returns a token cancelled by the first Ctrl-C
pub fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, finishing the current file");
            signal_token.cancel();
        }
    });
    token
}
