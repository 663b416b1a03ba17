//! Validated path newtypes
//!
//! - [`RelativePath`] - a file's path relative to a profile's source folder,
//!   always `/`-separated; this is the upload cache key
//! - [`RemotePath`] - an absolute OneDrive path such as `/Backup/Scans`

use std::fmt;
use std::path::{Component, Path};

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

// ============================================================================
// RelativePath
// ============================================================================

/// Path of a local file relative to the profile's source folder
///
/// Stored with `/` separators, without a leading slash, never empty and
/// never containing `.` or `..` components.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RelativePath(String);

impl RelativePath {
    /// Create a RelativePath from a `/`-separated string
    ///
    /// # Errors
    /// Returns error if the path is empty, absolute, or contains traversal
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let path = path.into();
        if path.is_empty() {
            return Err(DomainError::InvalidPath("empty relative path".to_string()));
        }
        if path.starts_with('/') {
            return Err(DomainError::InvalidPath(format!(
                "relative path must not start with '/': {path}"
            )));
        }
        if path
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
        {
            return Err(DomainError::InvalidPath(format!(
                "relative path contains an invalid segment: {path}"
            )));
        }
        Ok(Self(path))
    }

    /// Derive the relative path of `path` inside `root`
    ///
    /// # Errors
    /// Returns [`DomainError::PathNotInSource`] if `path` is not below `root`
    pub fn from_paths(root: &Path, path: &Path) -> Result<Self, DomainError> {
        let stripped = path
            .strip_prefix(root)
            .map_err(|_| DomainError::PathNotInSource(path.display().to_string()))?;

        let mut segments = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(part) => segments.push(part.to_string_lossy().into_owned()),
                _ => {
                    return Err(DomainError::InvalidPath(format!(
                        "unexpected component in {}",
                        stripped.display()
                    )))
                }
            }
        }
        Self::new(segments.join("/"))
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file name (last segment)
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    /// The parent directory, `""` for files directly in the source folder
    #[must_use]
    pub fn parent_dir(&self) -> &str {
        match self.0.rfind('/') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RelativePath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RelativePath> for String {
    fn from(value: RelativePath) -> Self {
        value.0
    }
}

// ============================================================================
// RemotePath
// ============================================================================

/// Absolute path in the remote drive, rooted at `/`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemotePath(String);

impl RemotePath {
    /// Create a new RemotePath
    ///
    /// A trailing slash is dropped (except for the root itself).
    ///
    /// # Errors
    /// Returns error if path doesn't start with `/`, contains `//` or `..`
    pub fn new(path: impl Into<String>) -> Result<Self, DomainError> {
        let mut path = path.into();
        if !path.starts_with('/') {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path must start with '/': {path}"
            )));
        }
        if path.len() > 1 && path.ends_with('/') {
            path.pop();
        }
        if path.len() > 1 && path.contains("//") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid double slashes: {path}"
            )));
        }
        if path.split('/').any(|segment| segment == "..") {
            return Err(DomainError::InvalidRemotePath(format!(
                "Remote path contains invalid traversal: {path}"
            )));
        }
        Ok(Self(path))
    }

    /// Create the root path "/"
    #[must_use]
    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Get the inner string reference
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Path segments, empty for the root
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Join a single path component
    ///
    /// # Errors
    /// Returns error if component is empty or contains `/` or `..`
    pub fn join(&self, component: &str) -> Result<Self, DomainError> {
        if component.is_empty() || component.contains('/') || component == ".." {
            return Err(DomainError::InvalidRemotePath(format!(
                "Invalid path component: {component}"
            )));
        }
        let joined = if self.is_root() {
            format!("/{component}")
        } else {
            format!("{}/{component}", self.0)
        };
        Self::new(joined)
    }

    /// Join every segment of a relative path
    ///
    /// # Errors
    /// Returns error if any segment is invalid
    pub fn join_relative(&self, relative: &str) -> Result<Self, DomainError> {
        relative
            .split('/')
            .filter(|s| !s.is_empty())
            .try_fold(self.clone(), |acc, segment| acc.join(segment))
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
