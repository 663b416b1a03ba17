//! Configuration module for PhotoSync.
//!
//! Typed configuration structs mapping to the YAML configuration file, with
//! loading, environment overrides, defaults and validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::newtypes::RemotePath;
use crate::retry::RetryPolicy;

/// Environment variable overriding `data_dir`.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Upload sessions require chunk sizes in multiples of 320 KiB.
pub const CHUNK_SIZE_GRANULE_KIB: u64 = 320;

/// Largest chunk accepted by an upload session (60 MiB).
pub const MAX_CHUNK_SIZE_KIB: u64 = 60 * 1024;

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for PhotoSync.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Azure AD application (client) ID used for device-code login.
    pub client_id: String,
    /// Root for per-profile state, token files and logs.
    pub data_dir: PathBuf,
    pub logging: LoggingConfig,
    pub network: NetworkConfig,
    pub auth: AuthConfig,
    pub transfer: TransferConfig,
    /// Camera-roll download profiles.
    pub profiles: Vec<DownloadProfile>,
    /// Local-to-remote upload profiles.
    pub upload_profiles: Vec<UploadProfile>,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Directory for daily log files; `{data_dir}/logs` when unset.
    pub directory: Option<PathBuf>,
}

/// HTTP client and retry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Upper bound for every single HTTP request, in seconds.
    pub request_timeout_secs: u64,
    /// Attempts per operation, including the first one.
    pub max_retries: u32,
    /// First backoff delay in milliseconds; doubles on each retry.
    pub retry_base_delay_ms: u64,
}

/// Where OAuth tokens are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenStoreKind {
    /// `{data_dir}/auth_{profile}.json`
    File,
    /// The desktop keyring (Secret Service)
    Keyring,
}

/// Authentication settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// How long to wait for an interactive device-code login, in seconds.
    pub timeout_secs: u64,
    pub token_store: TokenStoreKind,
}

/// Upload transfer and cache tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Upload session chunk size in KiB; must be a multiple of 320.
    pub chunk_size_kib: u64,
    /// Cache records buffered before a write transaction.
    pub cache_batch_size: usize,
    /// A run fails when `failed / (uploaded + failed)` exceeds this ratio.
    pub max_failure_ratio: f64,
}

/// Camera-roll download profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProfile {
    pub name: String,
    pub destination_folder: PathBuf,
    /// Delete the remote item once the local copy is verified.
    #[serde(default)]
    pub remove_downloaded: bool,
}

/// What to do when the remote already holds a file with the same name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemoteConflictPolicy {
    /// Always overwrite the remote item.
    #[default]
    Replace,
    /// Keep a remote item of identical size and only overwrite on mismatch.
    SkipSameSize,
}

/// Local-to-remote upload profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadProfile {
    pub name: String,
    pub source_folder: PathBuf,
    /// Absolute remote folder, e.g. `/Backup/Scans`.
    pub onedrive_folder: String,
    /// Glob patterns; empty matches every file.
    #[serde(default)]
    pub file_patterns: Vec<String>,
    #[serde(default = "default_true")]
    pub preserve_structure: bool,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default = "default_true")]
    pub use_watermark: bool,
    #[serde(default)]
    pub remove_uploaded: bool,
    #[serde(default)]
    pub on_remote_conflict: RemoteConflictPolicy,
}

fn default_true() -> bool {
    true
}

impl UploadProfile {
    /// Parsed remote root folder.
    pub fn remote_root(&self) -> Result<RemotePath, crate::domain::errors::DomainError> {
        RemotePath::new(self.onedrive_folder.clone())
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    ///
    /// The `DATA_DIR` environment variable, when set, replaces `data_dir`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config.with_data_dir_override(std::env::var(DATA_DIR_ENV).ok()))
    }

    /// Replace `data_dir` with a non-empty override.
    #[must_use]
    pub fn with_data_dir_override(mut self, data_dir: Option<String>) -> Self {
        if let Some(dir) = data_dir.filter(|d| !d.trim().is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        self
    }

    /// Directory holding one SQLite file per profile.
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join("state")
    }

    /// Directory for daily log files.
    pub fn log_dir(&self) -> PathBuf {
        self.logging
            .directory
            .clone()
            .unwrap_or_else(|| self.data_dir.join("logs"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.network.request_timeout_secs)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth.timeout_secs)
    }

    /// Retry policy shared by folder creation and chunk uploads.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.network.max_retries,
            Duration::from_millis(self.network.retry_base_delay_ms),
        )
    }

    pub fn chunk_size_bytes(&self) -> usize {
        (self.transfer.chunk_size_kib * 1024) as usize
    }

    pub fn upload_profile(&self, name: &str) -> Option<&UploadProfile> {
        self.upload_profiles.iter().find(|p| p.name == name)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            data_dir: PathBuf::from("./data"),
            logging: LoggingConfig::default(),
            network: NetworkConfig::default(),
            auth: AuthConfig::default(),
            transfer: TransferConfig::default(),
            profiles: Vec::new(),
            upload_profiles: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: 300,
            max_retries: 5,
            retry_base_delay_ms: 1000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 300,
            token_store: TokenStoreKind::File,
        }
    }
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size_kib: 10 * 1024,
            cache_batch_size: 500,
            max_failure_ratio: 0.5,
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"transfer.chunk_size_kib"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.client_id.trim().is_empty() {
            errors.push(ValidationError::new("client_id", "must not be empty"));
        }

        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            errors.push(ValidationError::new(
                "logging.level",
                format!(
                    "invalid level '{}', expected one of: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            ));
        }

        // --- network / auth ---
        if self.network.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "network.request_timeout_secs",
                "must be greater than 0",
            ));
        }
        if self.network.max_retries == 0 {
            errors.push(ValidationError::new(
                "network.max_retries",
                "must be at least 1",
            ));
        }
        if self.auth.timeout_secs == 0 {
            errors.push(ValidationError::new(
                "auth.timeout_secs",
                "must be greater than 0",
            ));
        }

        // --- transfer ---
        let chunk = self.transfer.chunk_size_kib;
        if chunk == 0 || chunk % CHUNK_SIZE_GRANULE_KIB != 0 {
            errors.push(ValidationError::new(
                "transfer.chunk_size_kib",
                format!("must be a positive multiple of {CHUNK_SIZE_GRANULE_KIB}"),
            ));
        } else if chunk > MAX_CHUNK_SIZE_KIB {
            errors.push(ValidationError::new(
                "transfer.chunk_size_kib",
                format!("must not exceed {MAX_CHUNK_SIZE_KIB}"),
            ));
        }
        if self.transfer.cache_batch_size == 0 {
            errors.push(ValidationError::new(
                "transfer.cache_batch_size",
                "must be greater than 0",
            ));
        }
        if !(0.0..=1.0).contains(&self.transfer.max_failure_ratio) {
            errors.push(ValidationError::new(
                "transfer.max_failure_ratio",
                "must be between 0.0 and 1.0",
            ));
        }

        // --- profiles ---
        let mut seen = HashSet::new();
        for (i, profile) in self.profiles.iter().enumerate() {
            let field = format!("profiles[{i}]");
            validate_profile_name(&field, &profile.name, &mut seen, &mut errors);
            if profile.destination_folder.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    format!("{field}.destination_folder"),
                    "must not be empty",
                ));
            }
        }

        let mut seen = HashSet::new();
        for (i, profile) in self.upload_profiles.iter().enumerate() {
            let field = format!("upload_profiles[{i}]");
            validate_profile_name(&field, &profile.name, &mut seen, &mut errors);
            if profile.source_folder.as_os_str().is_empty() {
                errors.push(ValidationError::new(
                    format!("{field}.source_folder"),
                    "must not be empty",
                ));
            }
            if let Err(e) = profile.remote_root() {
                errors.push(ValidationError::new(
                    format!("{field}.onedrive_folder"),
                    e.to_string(),
                ));
            }
            for (j, pattern) in profile.file_patterns.iter().enumerate() {
                if let Err(e) = glob::Pattern::new(pattern) {
                    errors.push(ValidationError::new(
                        format!("{field}.file_patterns[{j}]"),
                        format!("invalid pattern '{pattern}': {e}"),
                    ));
                }
            }
        }

        errors
    }
}

fn validate_profile_name(
    field: &str,
    name: &str,
    seen: &mut HashSet<String>,
    errors: &mut Vec<ValidationError>,
) {
    if name.trim().is_empty() {
        errors.push(ValidationError::new(
            format!("{field}.name"),
            "must not be empty",
        ));
    } else if name.contains(['/', '\\']) || name.starts_with('.') {
        errors.push(ValidationError::new(
            format!("{field}.name"),
            format!("'{name}' cannot be used as a file name"),
        ));
    } else if !seen.insert(name.to_string()) {
        errors.push(ValidationError::new(
            format!("{field}.name"),
            format!("duplicate profile name '{name}'"),
        ));
    }
}
