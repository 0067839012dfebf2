//! Run configuration assembly.
//!
//! Metadata for an upload comes from three layers, in descending priority:
//! explicit flags (including their `COVSHIP_*` environment fallbacks, which
//! the CLI parser resolves), variables injected by the CI runner, and local
//! git lookups. This crate owns the CI layer and the merge; the git layer
//! lives in `covship-git` and is applied by the caller.

use covship_types::PullRequest;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no API key provided: set --api-key or COVSHIP_API_KEY")]
    MissingApiKey,
    #[error("no repository provided: set --repository, COVSHIP_REPOSITORY, or run inside CI")]
    MissingRepository,
}

// ============================================================================
// Environment Access
// ============================================================================

/// Read access to environment variables.
///
/// Lookups yield `None` for unset and blank values alike, so callers can
/// chain fallbacks without re-checking for empty strings.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

/// [`EnvSource`] backed by the process environment.
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().and_then(non_blank)
    }
}

fn non_blank(value: String) -> Option<String> {
    if value.trim().is_empty() { None } else { Some(value) }
}

// ============================================================================
// CI Detection
// ============================================================================

/// Metadata recovered from CI runner variables.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CiContext {
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub pr_number: Option<String>,
    pub pr_base_branch: Option<String>,
    pub pr_base_sha: Option<String>,
}

/// Collect run metadata from GitHub Actions variables.
///
/// On pull request events `GITHUB_REF_NAME` holds the synthetic merge ref,
/// so the head branch is taken from `GITHUB_HEAD_REF` when set. Every field
/// is optional; outside CI the context is simply empty.
pub fn detect_ci_context(env: &dyn EnvSource) -> CiContext {
    CiContext {
        repository: env.var("GITHUB_REPOSITORY"),
        branch: env
            .var("GITHUB_HEAD_REF")
            .or_else(|| env.var("GITHUB_REF_NAME")),
        commit_sha: env.var("GITHUB_SHA"),
        pr_number: env.var("GITHUB_REF").and_then(|r| parse_pr_ref(&r)),
        pr_base_branch: env.var("GITHUB_BASE_REF"),
        pr_base_sha: None,
    }
}

/// Extract the pull request number from a `refs/pull/<n>/...` ref.
///
/// # Examples
///
/// ```
/// use covship_config::parse_pr_ref;
///
/// assert_eq!(parse_pr_ref("refs/pull/482/merge").as_deref(), Some("482"));
/// assert_eq!(parse_pr_ref("refs/heads/main"), None);
/// ```
pub fn parse_pr_ref(git_ref: &str) -> Option<String> {
    let rest = git_ref.strip_prefix("refs/pull/")?;
    let number = rest.split('/').next()?;
    if number.is_empty() || !number.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some(number.to_string())
}

// ============================================================================
// Metadata Merging
// ============================================================================

/// Values supplied explicitly on the command line or via `COVSHIP_*`
/// variables.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub commit_message: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub pr_number: Option<String>,
    pub pr_base_branch: Option<String>,
    pub pr_base_sha: Option<String>,
}

/// Overrides layered over CI detection. Fields still `None` here fall
/// through to git lookups in the caller.
#[derive(Debug, Default, Clone)]
pub struct MergedMetadata {
    pub repository: Option<String>,
    pub branch: Option<String>,
    pub commit_sha: Option<String>,
    pub commit_message: Option<String>,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub pull_request: PullRequest,
}

/// Merge explicit overrides with CI-detected values, overrides first.
pub fn merge_with_ci(overrides: Overrides, ci: CiContext) -> MergedMetadata {
    MergedMetadata {
        repository: overrides.repository.or(ci.repository),
        branch: overrides.branch.or(ci.branch),
        commit_sha: overrides.commit_sha.or(ci.commit_sha),
        commit_message: overrides.commit_message,
        author_name: overrides.author_name,
        author_email: overrides.author_email,
        pull_request: PullRequest {
            number: overrides.pr_number.or(ci.pr_number),
            base_branch: overrides.pr_base_branch.or(ci.pr_base_branch),
            base_sha: overrides.pr_base_sha.or(ci.pr_base_sha),
        },
    }
}

// ============================================================================
// Required Values
// ============================================================================

/// The API key, or [`ConfigError::MissingApiKey`] when absent or blank.
pub fn require_api_key(value: Option<String>) -> Result<String, ConfigError> {
    value.and_then(non_blank).ok_or(ConfigError::MissingApiKey)
}

/// The repository slug, or [`ConfigError::MissingRepository`] when absent
/// or blank.
pub fn require_repository(value: Option<String>) -> Result<String, ConfigError> {
    value.and_then(non_blank).ok_or(ConfigError::MissingRepository)
}

// ============================================================================
// Tests
// ============================================================================
