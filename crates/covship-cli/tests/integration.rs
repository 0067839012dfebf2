//! Integration tests for the covship CLI.
//!
//! These tests exercise the CLI as a subprocess against a mock ingestion
//! server, verifying exit codes, stdout, and the request actually sent.
//! Commit and branch metadata is always passed explicitly so the tests
//! never depend on the surrounding git checkout or CI variables.

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Get a Command for the covship binary with ambient configuration removed.
fn covship() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_covship"));
    for key in [
        "RUST_LOG",
        "COVSHIP_FILES",
        "COVSHIP_API_URL",
        "COVSHIP_API_KEY",
        "COVSHIP_REPOSITORY",
        "COVSHIP_BRANCH",
        "COVSHIP_WORKING_DIR",
        "COVSHIP_FAIL_ON_ERROR",
        "COVSHIP_TIMEOUT_SECS",
        "GITHUB_REPOSITORY",
        "GITHUB_REF",
        "GITHUB_REF_NAME",
        "GITHUB_HEAD_REF",
        "GITHUB_BASE_REF",
        "GITHUB_SHA",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

/// Write a coverage fixture under `dir` and return its absolute path.
fn write_coverage(dir: &Path, rel: &str, content: &str) -> String {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path.display().to_string()
}

/// Upload arguments that pin every metadata field, keeping git out of the run.
fn upload_args(files: &str, api_url: &str, repo_root: &Path) -> Vec<String> {
    vec![
        "upload".to_string(),
        "--files".to_string(),
        files.to_string(),
        "--api-url".to_string(),
        api_url.to_string(),
        "--api-key".to_string(),
        "test-key".to_string(),
        "--repository".to_string(),
        "acme/api".to_string(),
        "--branch".to_string(),
        "main".to_string(),
        "--repo-root".to_string(),
        repo_root.display().to_string(),
        "--commit-sha".to_string(),
        "deadbeef".to_string(),
        "--commit-message".to_string(),
        "tighten rounding".to_string(),
        "--author-name".to_string(),
        "Dev One".to_string(),
        "--author-email".to_string(),
        "dev@acme.test".to_string(),
    ]
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_displays_usage() {
    covship()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("covship"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("discover"));
}

#[test]
fn test_version_displays_version() {
    covship()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("covship"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_upload_help_displays_options() {
    covship()
        .args(["upload", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--files"))
        .stdout(predicate::str::contains("--api-url"))
        .stdout(predicate::str::contains("--api-key"))
        .stdout(predicate::str::contains("--repository"))
        .stdout(predicate::str::contains("--working-dir"))
        .stdout(predicate::str::contains("--fail-on-error"))
        .stdout(predicate::str::contains("--output"));
}

// ============================================================================
// Upload Tests
// ============================================================================

#[test]
fn test_upload_success_prints_report_id() {
    let temp = TempDir::new().unwrap();
    let coverage = write_coverage(temp.path(), "coverage.out", "mode: set\n");

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/coverage")
            .header("authorization", "Bearer test-key")
            .body_contains("name=\"repository\"")
            .body_contains("acme/api")
            .body_contains("name=\"commit_sha\"")
            .body_contains("deadbeef")
            .body_contains("filename=\"coverage.out\"")
            .body_contains("mode: set");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"report_id":"r-42","report_url":"https://covship.dev/r/42"}"#);
    });

    covship()
        .args(upload_args(&coverage, &server.url(""), temp.path()))
        .assert()
        .code(0)
        .stdout(predicate::str::contains("report id: r-42"))
        .stdout(predicate::str::contains("https://covship.dev/r/42"));

    mock.assert();
}

#[test]
fn test_upload_json_output_is_machine_readable() {
    let temp = TempDir::new().unwrap();
    let coverage = write_coverage(temp.path(), "lcov.info", "TN:\nend_of_record\n");

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/coverage");
        then.status(201).body(r#"{"id":"r-7"}"#);
    });

    let mut args = upload_args(&coverage, &server.url(""), temp.path());
    args.extend(["--output".to_string(), "json".to_string()]);

    let assert = covship().args(args).assert().code(0);
    let receipt: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).unwrap();

    assert_eq!(receipt["report_id"], "r-7");
    assert_eq!(receipt["report_url"], "");
}

#[test]
fn test_upload_forwards_pull_request_fields() {
    let temp = TempDir::new().unwrap();
    let coverage = write_coverage(temp.path(), "coverage.out", "mode: set\n");

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/coverage")
            .body_contains("name=\"pr_number\"")
            .body_contains("482")
            .body_contains("name=\"pr_base_branch\"");
        then.status(200).body(r#"{"report_id":"r-1"}"#);
    });

    let mut args = upload_args(&coverage, &server.url(""), temp.path());
    args.extend([
        "--pr-number".to_string(),
        "482".to_string(),
        "--pr-base-branch".to_string(),
        "main".to_string(),
    ]);

    covship().args(args).assert().code(0);
    mock.assert();
}

#[test]
fn test_upload_fills_metadata_from_ci_environment() {
    let temp = TempDir::new().unwrap();
    let coverage = write_coverage(temp.path(), "coverage.out", "mode: set\n");

    let server = MockServer::start();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/coverage")
            .body_contains("acme/from-ci")
            .body_contains("feature/upload")
            .body_contains("1234abcd");
        then.status(200).body(r#"{"report_id":"r-ci"}"#);
    });

    let api_url = server.url("");
    let repo_root = temp.path().display().to_string();
    covship()
        .args([
            "upload",
            "--files",
            coverage.as_str(),
            "--api-url",
            api_url.as_str(),
            "--api-key",
            "test-key",
            "--repo-root",
            repo_root.as_str(),
            "--commit-message",
            "msg",
            "--author-name",
            "Dev",
            "--author-email",
            "dev@acme.test",
        ])
        .env("GITHUB_REPOSITORY", "acme/from-ci")
        .env("GITHUB_REF_NAME", "feature/upload")
        .env("GITHUB_SHA", "1234abcd")
        .assert()
        .code(0);

    mock.assert();
}

// ============================================================================
// Failure Policy Tests
// ============================================================================

#[test]
fn test_remote_rejection_is_soft_by_default() {
    let temp = TempDir::new().unwrap();
    let coverage = write_coverage(temp.path(), "coverage.out", "mode: set\n");

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/coverage");
        then.status(500).body("ingestion exploded");
    });

    covship()
        .args(upload_args(&coverage, &server.url(""), temp.path()))
        .assert()
        .code(0)
        .stderr(predicate::str::contains("500"))
        .stderr(predicate::str::contains("fail-on-error"));
}

#[test]
fn test_remote_rejection_fails_with_fail_on_error() {
    let temp = TempDir::new().unwrap();
    let coverage = write_coverage(temp.path(), "coverage.out", "mode: set\n");

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/coverage");
        then.status(500).body("ingestion exploded");
    });

    let mut args = upload_args(&coverage, &server.url(""), temp.path());
    args.push("--fail-on-error".to_string());

    covship()
        .args(args)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("500"));
}

#[test]
fn test_nothing_matched_is_soft_by_default() {
    let temp = TempDir::new().unwrap();
    let pattern = format!("{}/nothing/**/*.out", temp.path().display());

    // No request is ever sent, so the API URL does not need to resolve.
    covship()
        .args(upload_args(&pattern, "http://127.0.0.1:9", temp.path()))
        .assert()
        .code(0)
        .stderr(predicate::str::contains("no coverage files matched"));
}

#[test]
fn test_nothing_matched_fails_with_fail_on_error() {
    let temp = TempDir::new().unwrap();
    let pattern = format!("{}/nothing/**/*.out", temp.path().display());

    let mut args = upload_args(&pattern, "http://127.0.0.1:9", temp.path());
    args.push("--fail-on-error".to_string());

    covship()
        .args(args)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no coverage files matched"));
}

#[test]
fn test_malformed_pattern_is_a_config_error() {
    let temp = TempDir::new().unwrap();

    // Discovery fails before any request is sent, so the API URL does not
    // need to resolve.
    covship()
        .args(upload_args("src/[", "http://127.0.0.1:9", temp.path()))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid glob pattern"));
}

#[test]
fn test_malformed_pattern_ignores_fail_on_error() {
    let temp = TempDir::new().unwrap();

    let mut args = upload_args("src/[", "http://127.0.0.1:9", temp.path());
    args.push("--fail-on-error".to_string());

    covship()
        .args(args)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid glob pattern"));
}

#[test]
fn test_missing_api_key_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let coverage = write_coverage(temp.path(), "coverage.out", "mode: set\n");

    let repo_root = temp.path().display().to_string();
    covship()
        .args([
            "upload",
            "--files",
            coverage.as_str(),
            "--repository",
            "acme/api",
            "--repo-root",
            repo_root.as_str(),
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("API key"));
}

#[test]
fn test_missing_repository_is_a_config_error() {
    let temp = TempDir::new().unwrap();
    let coverage = write_coverage(temp.path(), "coverage.out", "mode: set\n");

    let repo_root = temp.path().display().to_string();
    covship()
        .args([
            "upload",
            "--files",
            coverage.as_str(),
            "--api-key",
            "test-key",
            "--repo-root",
            repo_root.as_str(),
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("repository"));
}

// ============================================================================
// Discover Tests
// ============================================================================

#[test]
fn test_discover_lists_matches_and_context() {
    let temp = TempDir::new().unwrap();
    write_coverage(temp.path(), "go.mod", "module github.com/acme/api\n");
    let out_file = write_coverage(temp.path(), "svc/coverage.out", "mode: set\n");
    let info_file = write_coverage(temp.path(), "web/lcov.info", "TN:\n");

    let pattern = format!("{}/**/*.out\n{}/**/*.info", temp.path().display(), temp.path().display());

    let repo_root = temp.path().display().to_string();
    covship()
        .args([
            "discover",
            "--files",
            pattern.as_str(),
            "--repo-root",
            repo_root.as_str(),
        ])
        .assert()
        .code(0)
        .stdout(predicate::str::contains(out_file.as_str()))
        .stdout(predicate::str::contains(info_file.as_str()));
}

#[test]
fn test_discover_rejects_malformed_patterns() {
    covship()
        .args(["discover", "--files", "src/["])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid glob pattern"));
}
