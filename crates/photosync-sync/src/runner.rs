//! Multi-profile runner
//!
//! [`ProfileRunner`] wires the ports together for each configured profile:
//! it obtains an access token (bounded by the auth timeout), builds a drive
//! client, opens the profile's state database and runs the requested
//! operation. A failing profile is reported and the next one still runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use photosync_cache::ProfileStore;
use photosync_core::config::{Config, DownloadProfile, UploadProfile};
use photosync_core::domain::{AuthError, EntryState, RunResult, WatermarkRecord};
use photosync_core::ports::{
    BuildStats, IAuthenticator, IDriveClient, IDriveClientFactory, IUploadCache, IWatermarkStore,
};

use crate::download::{sync_camera_roll, DownloadResult};
use crate::upload::{SyncSettings, UploadSyncOrchestrator};
use crate::{cache_builder, SyncError};

/// Final state of one profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStatus {
    Succeeded,
    Failed,
    Cancelled,
}

/// What happened to one profile during a multi-profile run
#[derive(Debug, Clone, Serialize)]
pub struct ProfileReport<T> {
    pub profile: String,
    pub status: ProfileStatus,
    /// Counters, when the run got far enough to produce them
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> ProfileReport<T> {
    fn failed(profile: &str, err: &SyncError) -> Self {
        Self {
            profile: profile.to_string(),
            status: ProfileStatus::Failed,
            result: None,
            error: Some(err.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == ProfileStatus::Failed
    }
}

/// Cache summary of one profile
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatus {
    pub profile: String,
    pub db_path: Option<PathBuf>,
    pub entries: usize,
    pub uploaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub recovered_from_corruption: bool,
    pub watermark: Option<WatermarkRecord>,
}

/// Runs operations for configured profiles, one at a time
pub struct ProfileRunner {
    authenticator: Arc<dyn IAuthenticator>,
    drives: Arc<dyn IDriveClientFactory>,
    settings: SyncSettings,
    state_dir: PathBuf,
    cache_batch_size: usize,
    auth_timeout: Duration,
}

impl ProfileRunner {
    pub fn new(
        authenticator: Arc<dyn IAuthenticator>,
        drives: Arc<dyn IDriveClientFactory>,
        config: &Config,
    ) -> Self {
        Self {
            authenticator,
            drives,
            settings: SyncSettings::from_config(config),
            state_dir: config.state_dir(),
            cache_batch_size: config.transfer.cache_batch_size,
            auth_timeout: config.auth_timeout(),
        }
    }

    /// Obtains a drive client for `profile`, bounded by the auth timeout
    pub async fn connect(&self, profile: &str) -> Result<Arc<dyn IDriveClient>, SyncError> {
        let token = match tokio::time::timeout(
            self.auth_timeout,
            self.authenticator.get_access_token(profile),
        )
        .await
        {
            Ok(token) => token?,
            Err(_) => return Err(AuthError::Timeout(self.auth_timeout.as_secs()).into()),
        };
        Ok(self
            .drives
            .create(profile, token, Arc::clone(&self.authenticator)))
    }

    async fn open_store(&self, profile: &str) -> Result<ProfileStore, SyncError> {
        ProfileStore::open(&self.state_dir, profile, self.cache_batch_size)
            .await
            .map_err(|e| SyncError::Store(e.into()))
    }

    // ========================================================================
    // Uploads
    // ========================================================================

    /// Runs an incremental upload for one profile
    pub async fn run_upload(
        &self,
        profile: &UploadProfile,
        cancel: &CancellationToken,
    ) -> Result<RunResult, SyncError> {
        let drive = self.connect(&profile.name).await?;
        let mut store = self.open_store(&profile.name).await?;

        let orchestrator = UploadSyncOrchestrator::new(drive, self.settings);
        let result = orchestrator
            .run_upload_sync(profile, &mut store.cache, &store.watermarks, cancel)
            .await;
        store.close().await;
        result
    }

    /// Runs every upload profile in order, isolating failures
    pub async fn run_uploads(
        &self,
        profiles: &[UploadProfile],
        cancel: &CancellationToken,
    ) -> Vec<ProfileReport<RunResult>> {
        let mut reports = Vec::with_capacity(profiles.len());

        for profile in profiles {
            if cancel.is_cancelled() {
                warn!(profile = %profile.name, "Cancelled before start");
                reports.push(ProfileReport {
                    profile: profile.name.clone(),
                    status: ProfileStatus::Cancelled,
                    result: None,
                    error: None,
                });
                continue;
            }

            info!(profile = %profile.name, "Processing upload profile");
            let report = match self.run_upload(profile, cancel).await {
                Ok(result) => {
                    let (status, error) = if result.is_failure(self.settings.max_failure_ratio) {
                        let msg = format!(
                            "{} of {} transfers failed",
                            result.failed,
                            result.uploaded + result.failed
                        );
                        error!(profile = %profile.name, %msg, "Upload run failed");
                        (ProfileStatus::Failed, Some(msg))
                    } else if result.cancelled {
                        (ProfileStatus::Cancelled, None)
                    } else {
                        (ProfileStatus::Succeeded, None)
                    };
                    ProfileReport {
                        profile: profile.name.clone(),
                        status,
                        result: Some(result),
                        error,
                    }
                }
                Err(e) => {
                    error!(profile = %profile.name, error = %e, "Upload run aborted");
                    ProfileReport::failed(&profile.name, &e)
                }
            };
            reports.push(report);
        }
        reports
    }

    // ========================================================================
    // Camera roll downloads
    // ========================================================================

    /// Runs the camera roll download for every profile, isolating failures
    pub async fn run_downloads(
        &self,
        profiles: &[DownloadProfile],
        cancel: &CancellationToken,
    ) -> Vec<ProfileReport<DownloadResult>> {
        let mut reports = Vec::with_capacity(profiles.len());

        for profile in profiles {
            info!(profile = %profile.name, "Processing download profile");
            let outcome = match self.connect(&profile.name).await {
                Ok(drive) => sync_camera_roll(drive.as_ref(), profile, cancel).await,
                Err(e) => Err(e),
            };

            reports.push(match outcome {
                Ok(result) => ProfileReport {
                    profile: profile.name.clone(),
                    status: if result.cancelled {
                        ProfileStatus::Cancelled
                    } else {
                        ProfileStatus::Succeeded
                    },
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    error!(profile = %profile.name, error = %e, "Camera roll sync failed");
                    ProfileReport::failed(&profile.name, &e)
                }
            });
        }
        reports
    }

    // ========================================================================
    // Cache maintenance
    // ========================================================================

    /// Populates a profile's cache from its remote folder
    pub async fn build_cache(&self, profile: &UploadProfile) -> Result<BuildStats, SyncError> {
        let drive = self.connect(&profile.name).await?;
        let mut store = self.open_store(&profile.name).await?;
        let result = cache_builder::build_cache_from_remote(
            drive.as_ref(),
            profile,
            &mut store.cache,
            &self.settings.retry,
        )
        .await;
        store.close().await;
        result
    }

    /// Clears a profile's cache and watermark; needs no network access
    pub async fn clear_cache(&self, profile: &UploadProfile) -> Result<(), SyncError> {
        let mut store = self.open_store(&profile.name).await?;
        let result = cache_builder::clear_cache(&profile.name, &mut store.cache, &store.watermarks).await;
        store.close().await;
        result
    }

    pub async fn cache_status(&self, profile: &UploadProfile) -> Result<CacheStatus, SyncError> {
        let store = self.open_store(&profile.name).await?;
        let watermark = store.watermarks.get(&profile.name).await;
        let counts = store.cache.counts_by_state();
        let count = |state: EntryState| counts.get(&state).copied().unwrap_or(0);

        let status = CacheStatus {
            profile: profile.name.clone(),
            db_path: store.db_path().map(PathBuf::from),
            entries: store.cache.len(),
            uploaded: count(EntryState::Uploaded),
            skipped: count(EntryState::Skipped),
            failed: count(EntryState::Failed),
            recovered_from_corruption: store.cache.recovered_from_corruption(),
            watermark: None,
        };
        store.close().await;

        Ok(CacheStatus {
            watermark: watermark.map_err(SyncError::Store)?,
            ..status
        })
    }
}
