//! Local VCS fallbacks for run metadata.
//!
//! When the trigger context does not supply commit or branch information,
//! the values come from the `git` CLI. Everything here degrades to `None`
//! when git is missing or the directory is not a repository; the run itself
//! never fails over metadata lookups.

use covship_types::CommitInfo;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Pretty format yielding sha, author name, author email, and the full
/// message, separated by ASCII unit separators.
const HEAD_COMMIT_FORMAT: &str = "--pretty=format:%H%x1f%an%x1f%ae%x1f%B";

/// Resolve the repository root for this run.
///
/// Order: the explicit value, `git rev-parse --show-toplevel`, then the
/// process working directory.
pub fn resolve_repo_root(explicit: Option<String>) -> PathBuf {
    if let Some(path) = explicit {
        return PathBuf::from(path);
    }

    if let Ok(output) = Command::new("git")
        .args(["rev-parse", "--show-toplevel"])
        .output()
        && output.status.success()
    {
        let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}

/// Read metadata for the commit at HEAD of the repository at `repo_root`.
pub fn head_commit(repo_root: &Path) -> Option<CommitInfo> {
    let raw = git_stdout(repo_root, &["log", "-1", HEAD_COMMIT_FORMAT])?;
    parse_head_commit(&raw)
}

/// Name of the branch HEAD points at; `None` when detached.
pub fn head_branch(repo_root: &Path) -> Option<String> {
    let raw = git_stdout(repo_root, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let name = raw.trim();
    if name.is_empty() || name == "HEAD" {
        return None;
    }
    Some(name.to_string())
}

/// Split the unit-separated `git log` record into a [`CommitInfo`].
fn parse_head_commit(raw: &str) -> Option<CommitInfo> {
    let mut parts = raw.splitn(4, '\u{1f}');
    let sha = parts.next()?.trim().to_string();
    let author_name = parts.next()?.trim().to_string();
    let author_email = parts.next()?.trim().to_string();
    let message = parts.next()?.trim_end().to_string();
    if sha.is_empty() {
        return None;
    }
    Some(CommitInfo {
        sha,
        message,
        author_name,
        author_email,
    })
}

/// Stdout of a git invocation in `repo_root`, or `None` on any failure.
fn git_stdout(repo_root: &Path, args: &[&str]) -> Option<String> {
    let output = match Command::new("git").current_dir(repo_root).args(args).output() {
        Ok(output) => output,
        Err(e) => {
            tracing::debug!(error = %e, "git unavailable");
            return None;
        }
    };
    if !output.status.success() {
        tracing::debug!(?args, status = %output.status, "git command failed");
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

// ============================================================================
// Tests
// ============================================================================
