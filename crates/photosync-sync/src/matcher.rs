//! Glob filtering of relative paths
//!
//! Patterns without a `/` are matched against the file name only, so `*.pdf`
//! selects PDFs at any depth. Patterns containing a `/` are matched against
//! the whole relative path. Matching is case-insensitive and never touches
//! the filesystem.

use glob::{MatchOptions, Pattern, PatternError};

use photosync_core::domain::RelativePath;

const NAME_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

const PATH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: false,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

#[derive(Debug, Clone)]
struct CompiledPattern {
    pattern: Pattern,
    whole_path: bool,
}

/// Compiled set of include patterns; empty matches everything
#[derive(Debug, Clone, Default)]
pub struct PathMatcher {
    patterns: Vec<CompiledPattern>,
}

impl PathMatcher {
    /// Compiles the patterns of a profile
    ///
    /// # Errors
    /// Returns the first pattern that is not a valid glob
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, PatternError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                let p = p.as_ref();
                Ok(CompiledPattern {
                    pattern: Pattern::new(p)?,
                    whole_path: p.contains('/'),
                })
            })
            .collect::<Result<_, PatternError>>()?;
        Ok(Self { patterns })
    }

    pub fn matches(&self, path: &RelativePath) -> bool {
        if self.patterns.is_empty() {
            return true;
        }
        self.patterns.iter().any(|p| {
            if p.whole_path {
                p.pattern.matches_with(path.as_str(), PATH_OPTIONS)
            } else {
                p.pattern.matches_with(path.file_name(), NAME_OPTIONS)
            }
        })
    }
}
