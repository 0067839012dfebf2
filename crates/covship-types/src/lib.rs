//! Shared types for covship.
//!
//! This crate defines the data model passed between the discovery, path
//! resolution, and upload stages:
//!
//! - Commit and pull-request metadata attached to an upload
//! - The path-normalization context inferred from discovered files
//! - The diagnostic path summary (locality and basename collisions)
//! - The receipt returned by the ingestion endpoint

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

// ============================================================================
// Constants
// ============================================================================

/// Report identifier used when the remote response carries none.
pub const REPORT_ID_FALLBACK: &str = "unknown";

// ============================================================================
// Commit and Pull-Request Metadata
// ============================================================================

/// Commit metadata attached to an upload.
///
/// Fields may be empty strings when neither the trigger context nor the
/// local repository supplied a value; they are still transmitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitInfo {
    /// Full commit SHA.
    pub sha: String,
    /// Commit message, possibly multi-line.
    pub message: String,
    /// Author name.
    pub author_name: String,
    /// Author email.
    pub author_email: String,
}

/// Pull-request identifiers, all optional.
///
/// The number is kept as the raw string it arrived as; the wire encoder
/// drops it when it is not a well-formed unsigned integer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PullRequest {
    /// Pull-request number.
    pub number: Option<String>,
    /// Branch the pull request targets.
    pub base_branch: Option<String>,
    /// Commit SHA the pull request is based on.
    pub base_sha: Option<String>,
}

impl PullRequest {
    /// True when no identifier is present at all.
    pub fn is_empty(&self) -> bool {
        self.number.is_none() && self.base_branch.is_none() && self.base_sha.is_none()
    }
}

// ============================================================================
// Path Context
// ============================================================================

/// Normalization context inferred from the discovered coverage files.
///
/// The ingestion backend uses this to re-map coverage-tool-relative paths
/// onto repository-relative ones. Produced once per run and immutable after
/// construction; the optional fields stay `None` when no inference
/// succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathContext {
    /// Directory, relative to the repo root, that coverage-tool-relative
    /// paths should be interpreted against.
    pub working_directory: Option<String>,
    /// Module identifier declared by the nearest build manifest.
    pub module_path: Option<String>,
    /// Checkout root for this run.
    pub repo_root: PathBuf,
}

impl PathContext {
    /// Context carrying only the repo root, with nothing inferred.
    pub fn bare(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            working_directory: None,
            module_path: None,
            repo_root: repo_root.into(),
        }
    }
}

// ============================================================================
// Diagnostic Path Summary
// ============================================================================

/// A coverage file that resolves outside the repository root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutsidePath {
    /// Path exactly as it was discovered.
    pub original: String,
    /// Absolute location it resolves to.
    pub resolved: PathBuf,
}

/// Read-only locality and collision view over a set of coverage paths.
///
/// Purely diagnostic: it never influences context resolution or the upload.
/// Every input path lands in exactly one of the inside/outside
/// classifications; basenames are tallied across the whole input set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSummary {
    /// Distinct directories, relative to the repo root (`.` for the root
    /// itself), containing in-repo coverage files. Sorted.
    pub inside_dirs: BTreeSet<String>,
    /// Files resolving outside the repo root, in input order.
    pub outside_repo: Vec<OutsidePath>,
    /// Basenames shared by more than one file, with their counts.
    pub duplicate_basenames: BTreeMap<String, usize>,
}

// ============================================================================
// Upload Receipt
// ============================================================================

/// Outcome of an acknowledged upload.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReceipt {
    /// Identifier assigned by the remote, or [`REPORT_ID_FALLBACK`].
    pub report_id: String,
    /// Link to the ingested report; empty when the remote omitted it.
    #[serde(default)]
    pub report_url: String,
}

// ============================================================================
// Tests
// ============================================================================
