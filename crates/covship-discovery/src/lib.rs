//! Coverage file discovery.
//!
//! Expands a block of newline-separated glob patterns into a deduplicated,
//! order-preserving list of paths. Discovery is read-only: it walks the
//! filesystem but never follows symlinked directories into recursion and
//! never writes.

use std::collections::HashSet;
use std::path::PathBuf;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Errors raised while expanding glob patterns.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// A pattern line could not be compiled.
    #[error("invalid glob pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

// ============================================================================
// Discovery
// ============================================================================

/// Split a pattern block into trimmed, non-empty pattern lines.
pub fn split_patterns(block: &str) -> Vec<&str> {
    block
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect()
}

/// Expand every pattern in `block` against the filesystem.
///
/// Matches keep the order in which paths were first encountered, across
/// patterns in pattern order; a path matched by several patterns appears
/// once. Matching nothing yields an empty list, not an error; the caller
/// decides what an empty result means.
///
/// Patterns are interpreted relative to the process working directory, and
/// matches are not filtered by file type: a pattern that names a directory
/// yields that directory path.
///
/// # Examples
///
/// ```rust
/// use covship_discovery::discover;
///
/// let found = discover("  \n\n").unwrap();
/// assert!(found.is_empty());
/// ```
pub fn discover(block: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    let mut matched = Vec::new();
    let mut seen = HashSet::new();

    for pattern in split_patterns(block) {
        let entries = glob::glob(pattern).map_err(|source| DiscoveryError::InvalidPattern {
            pattern: pattern.to_string(),
            source,
        })?;
        for entry in entries {
            match entry {
                Ok(path) => {
                    if seen.insert(path.clone()) {
                        matched.push(path);
                    }
                }
                Err(e) => {
                    tracing::debug!(pattern, error = %e, "skipping unreadable glob entry");
                }
            }
        }
    }

    Ok(matched)
}

// ============================================================================
// Tests
// ============================================================================
