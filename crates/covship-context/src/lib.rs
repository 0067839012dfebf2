//! Path context resolution for discovered coverage files.
//!
//! Coverage tools write file paths relative to whatever directory the tests
//! ran in, which rarely matches the repository root a backend sees. This
//! crate infers the normalization context (working directory and module
//! identifier) that lets the backend re-map those paths, and produces a
//! diagnostic summary of where the discovered files actually live.
//!
//! Resolution runs a chain of probes in priority order and stops at the
//! first success:
//!
//! 1. An explicitly supplied working directory, taken verbatim
//! 2. Go coverage profiles (`*.out`), walking up to the nearest `go.mod`
//! 3. XML/LCOV reports, walking up to the nearest `package.json`
//! 4. A bare context holding only the repo root
//!
//! Probes never fail: filesystem errors are logged at debug level and
//! demoted to "not found".

use covship_types::{OutsidePath, PathContext, PathSummary};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Component, Path, PathBuf};

// ============================================================================
// Markers and File Families
// ============================================================================

/// Manifest marking the root of a Go module.
pub const GO_MODULE_MARKER: &str = "go.mod";

/// Manifest marking the root of a Node package.
pub const NODE_PACKAGE_MARKER: &str = "package.json";

/// Extension identifying Go coverage profiles.
const GO_COVERAGE_EXT: &str = "out";

/// Basename substrings identifying XML and LCOV report files.
const REPORT_NAME_HINTS: &[&str] = &["coverage.xml", "lcov.info"];

// ============================================================================
// Probe Chain
// ============================================================================

/// Inputs shared by every probe in the chain.
struct ProbeInput<'a> {
    repo_root: &'a Path,
    files: &'a [PathBuf],
    explicit_working_dir: Option<&'a str>,
}

/// What a successful probe inferred.
#[derive(Debug, Default, PartialEq, Eq)]
struct Resolution {
    working_directory: Option<String>,
    module_path: Option<String>,
}

type Probe = fn(&ProbeInput) -> Option<Resolution>;

/// Probes in priority order; the first returning `Some` wins.
const PROBES: &[(&str, Probe)] = &[
    ("explicit", probe_explicit),
    ("go-coverage", probe_go_coverage),
    ("report-manifest", probe_report_manifest),
];

/// Resolve the path-normalization context for a set of discovered files.
///
/// When `files` is non-empty the locality summary is logged first; that
/// emission is diagnostic only and never changes the result. The probe
/// chain then runs until one probe succeeds, falling back to a context
/// carrying only `repo_root`.
pub fn resolve_context(
    repo_root: &Path,
    files: &[PathBuf],
    explicit_working_dir: Option<&str>,
) -> PathContext {
    if !files.is_empty() {
        let summary = summarize_paths(repo_root, files);
        log_summary(repo_root, explicit_working_dir, &summary);
    }

    let input = ProbeInput {
        repo_root,
        files,
        explicit_working_dir,
    };
    for (name, probe) in PROBES {
        if let Some(found) = probe(&input) {
            tracing::debug!(
                probe = name,
                working_directory = found.working_directory.as_deref(),
                module_path = found.module_path.as_deref(),
                "path context resolved"
            );
            return PathContext {
                working_directory: found.working_directory,
                module_path: found.module_path,
                repo_root: repo_root.to_path_buf(),
            };
        }
    }

    PathContext::bare(repo_root)
}

/// Probe 1: an explicitly supplied working directory wins outright.
///
/// The directory is used verbatim; the module probe still runs under it so
/// Go uploads keep their module identifier.
fn probe_explicit(input: &ProbeInput) -> Option<Resolution> {
    let dir = input.explicit_working_dir?;
    let module_path = read_module_path(&input.repo_root.join(dir));
    Some(Resolution {
        working_directory: Some(dir.to_string()),
        module_path,
    })
}

/// Probe 2: Go coverage profiles.
///
/// Takes the first `*.out` file in discovery order and walks up from its
/// directory looking for `go.mod`. Succeeds when that produced a working
/// directory or a module identifier; with neither, later probes get their
/// turn.
fn probe_go_coverage(input: &ProbeInput) -> Option<Resolution> {
    let file = input
        .files
        .iter()
        .find(|f| f.extension().and_then(|e| e.to_str()) == Some(GO_COVERAGE_EXT))?;
    let start = containing_dir(input.repo_root, file)?;

    let module_dir = find_marker_upward(&start, input.repo_root, GO_MODULE_MARKER);
    let working_directory = module_dir
        .as_deref()
        .map(|dir| relative_to_root(input.repo_root, dir));
    let module_path = read_module_path(module_dir.as_deref().unwrap_or(input.repo_root));

    if working_directory.is_none() && module_path.is_none() {
        return None;
    }
    Some(Resolution {
        working_directory,
        module_path,
    })
}

/// Probe 3: XML/LCOV reports.
///
/// Takes the first file whose basename carries a known report name and
/// walks up from its directory looking for `package.json`. No module
/// identifier for this family.
fn probe_report_manifest(input: &ProbeInput) -> Option<Resolution> {
    let file = input.files.iter().find(|f| {
        f.file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|name| REPORT_NAME_HINTS.iter().any(|hint| name.contains(hint)))
    })?;
    let start = containing_dir(input.repo_root, file)?;

    let package_dir = find_marker_upward(&start, input.repo_root, NODE_PACKAGE_MARKER)?;
    Some(Resolution {
        working_directory: Some(relative_to_root(input.repo_root, &package_dir)),
        module_path: None,
    })
}

// ============================================================================
// Marker Probing
// ============================================================================

/// Walk from `start` up toward the repo root, returning the first directory
/// that directly contains `marker`.
///
/// Stops with `None` once the current directory is no longer a descendant
/// of (or equal to) the repo root, or once the filesystem root is reached.
fn find_marker_upward(start: &Path, repo_root: &Path, marker: &str) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if !current.starts_with(repo_root) {
            return None;
        }
        if marker_present(&current.join(marker)) {
            return Some(current);
        }
        if !current.pop() {
            return None;
        }
    }
}

/// Check for a marker file, demoting I/O errors to "absent".
fn marker_present(candidate: &Path) -> bool {
    match std::fs::metadata(candidate) {
        Ok(meta) => meta.is_file(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::debug!(path = %candidate.display(), error = %e, "marker probe failed");
            false
        }
    }
}

/// Parse the module identifier out of a `go.mod` directly inside `dir`.
///
/// A missing manifest, a manifest without a declaration, or a read error
/// all yield `None`.
pub fn read_module_path(dir: &Path) -> Option<String> {
    let manifest = dir.join(GO_MODULE_MARKER);
    let text = match std::fs::read_to_string(&manifest) {
        Ok(text) => text,
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %manifest.display(), error = %e, "module manifest unreadable");
            }
            return None;
        }
    };
    parse_module_line(&text)
}

/// Extract the identifier from the first `module <identifier>` line.
///
/// The identifier is the first whitespace-separated token after the
/// keyword; lines with the keyword but no identifier do not match.
///
/// # Examples
///
/// ```rust
/// use covship_context::parse_module_line;
///
/// let text = "// generated\nmodule example.com/foo\n\ngo 1.22\n";
/// assert_eq!(parse_module_line(text).as_deref(), Some("example.com/foo"));
/// assert_eq!(parse_module_line("go 1.22\n"), None);
/// ```
pub fn parse_module_line(text: &str) -> Option<String> {
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        if tokens.next() == Some("module")
            && let Some(identifier) = tokens.next()
        {
            return Some(identifier.to_string());
        }
    }
    None
}

// ============================================================================
// Path Classification
// ============================================================================

/// Build the locality and collision summary for a set of discovered files.
///
/// Classification is lexical: nothing here touches the filesystem, so the
/// summary is deterministic for a given input.
pub fn summarize_paths(repo_root: &Path, files: &[PathBuf]) -> PathSummary {
    let mut inside_dirs = BTreeSet::new();
    let mut outside_repo = Vec::new();
    let mut basenames: BTreeMap<String, usize> = BTreeMap::new();

    for file in files {
        let resolved = absolutize(repo_root, file);
        if let Some(name) = resolved.file_name() {
            *basenames
                .entry(name.to_string_lossy().into_owned())
                .or_insert(0) += 1;
        }

        let inside_dir = match resolved.strip_prefix(repo_root) {
            Ok(rel) if !rel.as_os_str().is_empty() => Some(
                rel.parent()
                    .filter(|p| !p.as_os_str().is_empty())
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|| ".".to_string()),
            ),
            _ => None,
        };
        match inside_dir {
            Some(dir) => {
                inside_dirs.insert(dir);
            }
            None => outside_repo.push(OutsidePath {
                original: file.display().to_string(),
                resolved,
            }),
        }
    }

    basenames.retain(|_, count| *count > 1);
    PathSummary {
        inside_dirs,
        outside_repo,
        duplicate_basenames: basenames,
    }
}

/// Resolve `path` to an absolute, lexically normalized form.
///
/// Relative paths resolve against the repo root. Nothing is required to
/// exist and no symlinks are followed.
pub fn absolutize(repo_root: &Path, path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        repo_root.join(path)
    };
    normalize_lexically(&joined)
}

/// Squash `.` and `..` components without touching the filesystem.
///
/// `..` pops its parent and clamps at the filesystem root for absolute
/// paths; leading `..` is kept for relative ones.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !path.is_absolute() {
                    out.push(Component::ParentDir);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Absolute, normalized directory containing `file`.
fn containing_dir(repo_root: &Path, file: &Path) -> Option<PathBuf> {
    absolutize(repo_root, file).parent().map(Path::to_path_buf)
}

/// `dir` relative to the repo root; `.` when it is the root itself.
fn relative_to_root(repo_root: &Path, dir: &Path) -> String {
    match dir.strip_prefix(repo_root) {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_string_lossy().into_owned(),
        _ => ".".to_string(),
    }
}

// ============================================================================
// Diagnostics Emission
// ============================================================================

/// Emit the locality summary as structured logs.
///
/// Diagnostic only: callers must see identical behavior with logging
/// disabled entirely.
fn log_summary(repo_root: &Path, explicit_working_dir: Option<&str>, summary: &PathSummary) {
    tracing::debug!(repo_root = %repo_root.display(), "classifying coverage file paths");
    if let Some(dir) = explicit_working_dir {
        tracing::debug!(working_directory = dir, "explicit working directory supplied");
    }

    if summary.inside_dirs.is_empty() {
        tracing::warn!("no coverage files resolve inside the repository root");
    } else {
        tracing::info!(
            directories = ?summary.inside_dirs,
            "coverage files found under the repository root"
        );
    }

    for outside in &summary.outside_repo {
        tracing::warn!(
            original = %outside.original,
            resolved = %outside.resolved.display(),
            "coverage file resolves outside the repository root and cannot be made repo-relative"
        );
    }

    if !summary.duplicate_basenames.is_empty() {
        tracing::info!(
            duplicates = ?summary.duplicate_basenames,
            "coverage files share basenames; collisions complicate downstream path matching"
        );
    }
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn each_distinct_directory_file_is_classified_inside(
            names in prop::collection::vec("[a-z]{1,3}", 1..8)
        ) {
            let files: Vec<PathBuf> = names
                .iter()
                .enumerate()
                .map(|(i, name)| PathBuf::from(format!("d{i}/{name}.out")))
                .collect();
            let summary = summarize_paths(Path::new("/repo"), &files);

            prop_assert!(summary.outside_repo.is_empty());
            prop_assert_eq!(summary.inside_dirs.len(), files.len());
            for (_, count) in &summary.duplicate_basenames {
                prop_assert!(*count > 1);
            }
        }

        #[test]
        fn normalized_relative_paths_stay_under_the_root(
            segments in prop::collection::vec("[a-z]{1,4}", 1..5)
        ) {
            let path = PathBuf::from(segments.join("/"));
            let resolved = absolutize(Path::new("/repo"), &path);
            prop_assert!(resolved.starts_with("/repo"));
        }
    }
}
