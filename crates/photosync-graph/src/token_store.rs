//! Per-profile OAuth token persistence
//!
//! - [`FileTokenStore`] - JSON file `{dir}/auth_{profile}.json`
//! - [`KeyringTokenStore`] - System keyring (Secret Service, Keychain, ...)

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use photosync_core::domain::AuthError;
use photosync_core::ports::Tokens;

/// Keyring service name for storing tokens
const KEYRING_SERVICE: &str = "photosync";

/// Storage for a profile's OAuth tokens
pub trait TokenStore: Send + Sync {
    fn load(&self, profile: &str) -> Result<Option<Tokens>, AuthError>;
    fn save(&self, profile: &str, tokens: &Tokens) -> Result<(), AuthError>;
    /// Removes stored tokens; succeeds if none exist
    fn clear(&self, profile: &str) -> Result<(), AuthError>;
}

// ============================================================================
// FileTokenStore
// ============================================================================

/// Stores tokens as pretty-printed JSON, one file per profile
pub struct FileTokenStore {
    dir: PathBuf,
}

impl FileTokenStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn token_path(&self, profile: &str) -> PathBuf {
        self.dir.join(format!("auth_{profile}.json"))
    }
}

fn storage_err(path: &Path, e: impl std::fmt::Display) -> AuthError {
    AuthError::Storage(format!("{}: {e}", path.display()))
}

impl TokenStore for FileTokenStore {
    fn load(&self, profile: &str) -> Result<Option<Tokens>, AuthError> {
        let path = self.token_path(profile);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(profile, "No token file");
                return Ok(None);
            }
            Err(e) => return Err(storage_err(&path, e)),
        };
        let tokens = serde_json::from_str(&json).map_err(|e| storage_err(&path, e))?;
        debug!(profile, path = %path.display(), "Loaded tokens from file");
        Ok(Some(tokens))
    }

    fn save(&self, profile: &str, tokens: &Tokens) -> Result<(), AuthError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| storage_err(&self.dir, e))?;
        let path = self.token_path(profile);
        let json = serde_json::to_string_pretty(tokens).map_err(|e| storage_err(&path, e))?;
        std::fs::write(&path, json).map_err(|e| storage_err(&path, e))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| storage_err(&path, e))?;
        }

        info!(profile, path = %path.display(), "Token saved");
        Ok(())
    }

    fn clear(&self, profile: &str) -> Result<(), AuthError> {
        let path = self.token_path(profile);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                info!(profile, "Removed token file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_err(&path, e)),
        }
    }
}

// ============================================================================
// KeyringTokenStore
// ============================================================================

/// Stores tokens in the system keyring under service `photosync`
///
/// The profile name is used as the keyring username.
#[derive(Default)]
pub struct KeyringTokenStore;

impl KeyringTokenStore {
    fn entry(profile: &str) -> Result<keyring::Entry, AuthError> {
        keyring::Entry::new(KEYRING_SERVICE, profile)
            .map_err(|e| AuthError::Storage(format!("Failed to create keyring entry: {e}")))
    }
}

impl TokenStore for KeyringTokenStore {
    fn load(&self, profile: &str) -> Result<Option<Tokens>, AuthError> {
        match Self::entry(profile)?.get_password() {
            Ok(json) => {
                let tokens = serde_json::from_str(&json).map_err(|e| {
                    AuthError::Storage(format!("Failed to deserialize tokens from keyring: {e}"))
                })?;
                debug!(profile, "Loaded tokens from keyring");
                Ok(Some(tokens))
            }
            Err(keyring::Error::NoEntry) => {
                debug!(profile, "No tokens found in keyring");
                Ok(None)
            }
            Err(e) => Err(AuthError::Storage(format!("Failed to read from keyring: {e}"))),
        }
    }

    fn save(&self, profile: &str, tokens: &Tokens) -> Result<(), AuthError> {
        let json = serde_json::to_string(tokens)
            .map_err(|e| AuthError::Storage(format!("Failed to serialize tokens: {e}")))?;
        Self::entry(profile)?
            .set_password(&json)
            .map_err(|e| AuthError::Storage(format!("Failed to store tokens in keyring: {e}")))?;
        debug!(profile, "Stored tokens in keyring");
        Ok(())
    }

    fn clear(&self, profile: &str) -> Result<(), AuthError> {
        match Self::entry(profile)?.delete_credential() {
            Ok(()) => {
                info!(profile, "Cleared tokens from keyring");
                Ok(())
            }
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(AuthError::Storage(format!(
                "Failed to delete from keyring: {e}"
            ))),
        }
    }
}
