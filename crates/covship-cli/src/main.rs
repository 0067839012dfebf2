//! covship discovers coverage report files in CI, infers the path context they were produced under, and uploads them to a coverage ingestion API in a single multipart request.
//!
//! This CLI tool is meant to run as the last step of a test job: point it at
//! the coverage files with glob patterns and it fills in repository, commit,
//! and pull request metadata from flags, CI variables, or local git.

use clap::{Parser, Subcommand, ValueEnum};
use covship_app::{AppError, RunOutcome, UploadRequest, run_upload};
use covship_client::{ClientError, CoverageClient};
use covship_config::{
    ConfigError, MergedMetadata, Overrides, ProcessEnv, detect_ci_context, merge_with_ci,
    require_api_key, require_repository,
};
use covship_types::{CommitInfo, UploadReceipt};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Ingestion API used when neither --api-url nor COVSHIP_API_URL is given.
const DEFAULT_API_URL: &str = "https://api.covship.dev";

/// covship discovers coverage report files in CI, infers the path context they were produced under, and uploads them to a coverage ingestion API in a single multipart request.
#[derive(Parser)]
#[command(name = "covship")]
#[command(
    about = "covship discovers coverage report files in CI, infers the path context they were produced under, and uploads them to a coverage ingestion API in a single multipart request."
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Receipt output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable report id and URL
    #[default]
    Text,
    /// The receipt as one JSON object
    Json,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// Discover coverage files and upload them in one request
    Upload {
        /// Newline-separated glob patterns selecting coverage files
        #[arg(long, env = "COVSHIP_FILES")]
        files: String,

        /// Base URL of the ingestion API
        #[arg(long, env = "COVSHIP_API_URL", default_value = DEFAULT_API_URL)]
        api_url: String,

        /// API key sent as the bearer token
        #[arg(long, env = "COVSHIP_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Repository slug, e.g. acme/api (default: CI environment)
        #[arg(long, env = "COVSHIP_REPOSITORY")]
        repository: Option<String>,

        /// Branch the coverage was produced on (default: CI environment, then git)
        #[arg(long, env = "COVSHIP_BRANCH")]
        branch: Option<String>,

        /// Working directory relative to the repo root, overriding inference
        #[arg(long, env = "COVSHIP_WORKING_DIR")]
        working_dir: Option<String>,

        /// Repo root (default: git toplevel, then the current directory)
        #[arg(long)]
        repo_root: Option<String>,

        /// Commit SHA (default: CI environment, then git HEAD)
        #[arg(long)]
        commit_sha: Option<String>,

        /// Commit message (default: git HEAD)
        #[arg(long)]
        commit_message: Option<String>,

        /// Commit author name (default: git HEAD)
        #[arg(long)]
        author_name: Option<String>,

        /// Commit author email (default: git HEAD)
        #[arg(long)]
        author_email: Option<String>,

        /// Pull request number (default: CI environment)
        #[arg(long)]
        pr_number: Option<String>,

        /// Branch the pull request targets (default: CI environment)
        #[arg(long)]
        pr_base_branch: Option<String>,

        /// Commit SHA the pull request is based on
        #[arg(long)]
        pr_base_sha: Option<String>,

        /// Exit non-zero when nothing matches or the upload fails
        #[arg(long, env = "COVSHIP_FAIL_ON_ERROR")]
        fail_on_error: bool,

        /// HTTP timeout in seconds
        #[arg(long, env = "COVSHIP_TIMEOUT_SECS", default_value_t = 30)]
        timeout_secs: u64,

        /// Receipt output format
        #[arg(long, value_enum, default_value = "text")]
        output: OutputFormat,
    },
    /// List the files the patterns match and the context they imply
    Discover {
        /// Newline-separated glob patterns selecting coverage files
        #[arg(long, env = "COVSHIP_FILES")]
        files: String,

        /// Repo root (default: git toplevel, then the current directory)
        #[arg(long)]
        repo_root: Option<String>,

        /// Working directory relative to the repo root, overriding inference
        #[arg(long, env = "COVSHIP_WORKING_DIR")]
        working_dir: Option<String>,
    },
}

/// CLI errors
#[derive(Debug, Error)]
enum CliError {
    #[error("no coverage files matched the requested patterns")]
    NothingMatched,

    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Client(#[from] ClientError),

    #[error("{0}")]
    Run(#[from] AppError),

    #[error("failed to render receipt: {0}")]
    Render(#[from] serde_json::Error),
}

/// Exit codes:
/// - 0: upload acknowledged, or skipped without --fail-on-error
/// - 1: the run failed and --fail-on-error is set
/// - 2: configuration error (bad flags or patterns, missing API key or
///   repository)
const EXIT_OK: i32 = 0;
const EXIT_FAILURE: i32 = 1;
const EXIT_CONFIG: i32 = 2;

fn main() {
    init_logging();
    let cli = Cli::parse();
    let exit_code = run(cli);
    std::process::exit(exit_code);
}

/// Diagnostics go to stderr so stdout stays reserved for the receipt and
/// discover listings.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> i32 {
    match cli.command {
        Commands::Upload {
            files,
            api_url,
            api_key,
            repository,
            branch,
            working_dir,
            repo_root,
            commit_sha,
            commit_message,
            author_name,
            author_email,
            pr_number,
            pr_base_branch,
            pr_base_sha,
            fail_on_error,
            timeout_secs,
            output,
        } => {
            let overrides = Overrides {
                repository,
                branch,
                commit_sha,
                commit_message,
                author_name,
                author_email,
                pr_number,
                pr_base_branch,
                pr_base_sha,
            };

            match execute_upload(
                &files,
                &api_url,
                api_key,
                overrides,
                working_dir,
                repo_root,
                timeout_secs,
                output,
            ) {
                Ok(code) => code,
                Err(CliError::Config(e)) => {
                    tracing::error!(error = %e, "invalid configuration");
                    EXIT_CONFIG
                }
                Err(CliError::Run(AppError::Discovery(e))) => {
                    tracing::error!(error = %e, "invalid file pattern");
                    EXIT_CONFIG
                }
                Err(e) if fail_on_error => {
                    tracing::error!(error = %e, "coverage upload failed");
                    EXIT_FAILURE
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "coverage upload did not complete; continuing because --fail-on-error is not set"
                    );
                    EXIT_OK
                }
            }
        }
        Commands::Discover {
            files,
            repo_root,
            working_dir,
        } => run_discover(&files, repo_root, working_dir.as_deref()),
    }
}

#[allow(clippy::too_many_arguments)]
fn execute_upload(
    files: &str,
    api_url: &str,
    api_key: Option<String>,
    overrides: Overrides,
    working_dir: Option<String>,
    repo_root: Option<String>,
    timeout_secs: u64,
    output: OutputFormat,
) -> Result<i32, CliError> {
    let ci = detect_ci_context(&ProcessEnv);
    let merged = merge_with_ci(overrides, ci);

    let repo_root = covship_git::resolve_repo_root(repo_root);
    let commit = resolve_commit(&merged, &repo_root);
    let branch = merged
        .branch
        .or_else(|| covship_git::head_branch(&repo_root))
        .unwrap_or_default();

    let repository = require_repository(merged.repository)?;
    let api_key = require_api_key(api_key)?;

    let request = UploadRequest {
        patterns: files.to_string(),
        repo_root,
        working_dir,
        repository,
        branch,
        commit,
        pull_request: merged.pull_request,
    };

    let client = CoverageClient::new(api_url, api_key, Duration::from_secs(timeout_secs))?;
    match run_upload(&request, &client)? {
        RunOutcome::Uploaded(receipt) => {
            print_receipt(&receipt, output)?;
            Ok(EXIT_OK)
        }
        RunOutcome::NothingToUpload => Err(CliError::NothingMatched),
    }
}

/// Fill commit fields from flags and CI first, then git HEAD for whatever
/// is still missing. Fields nothing can supply stay empty strings.
fn resolve_commit(merged: &MergedMetadata, repo_root: &Path) -> CommitInfo {
    let needs_git = merged.commit_sha.is_none()
        || merged.commit_message.is_none()
        || merged.author_name.is_none()
        || merged.author_email.is_none();
    let fallback = if needs_git {
        covship_git::head_commit(repo_root).unwrap_or_default()
    } else {
        CommitInfo::default()
    };

    CommitInfo {
        sha: merged.commit_sha.clone().unwrap_or(fallback.sha),
        message: merged.commit_message.clone().unwrap_or(fallback.message),
        author_name: merged.author_name.clone().unwrap_or(fallback.author_name),
        author_email: merged.author_email.clone().unwrap_or(fallback.author_email),
    }
}

fn print_receipt(receipt: &UploadReceipt, output: OutputFormat) -> Result<(), CliError> {
    match output {
        OutputFormat::Text => {
            println!("report id: {}", receipt.report_id);
            if !receipt.report_url.is_empty() {
                println!("report url: {}", receipt.report_url);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string(receipt)?);
        }
    }
    Ok(())
}

fn run_discover(files: &str, repo_root: Option<String>, working_dir: Option<&str>) -> i32 {
    let matched = match covship_discovery::discover(files) {
        Ok(matched) => matched,
        Err(e) => {
            tracing::error!(error = %e, "discovery failed");
            return EXIT_CONFIG;
        }
    };

    for path in &matched {
        println!("{}", path.display());
    }

    let repo_root = covship_git::resolve_repo_root(repo_root);
    let context = covship_context::resolve_context(&repo_root, &matched, working_dir);
    if let Some(dir) = &context.working_directory {
        tracing::info!(working_directory = dir, "inferred working directory");
    }
    if let Some(module) = &context.module_path {
        tracing::info!(module_path = module, "inferred module path");
    }
    EXIT_OK
}


// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// CLI parsing should never panic regardless of argument values
        #[test]
        fn upload_parsing_does_not_panic(
            files in ".*",
            api_url in ".*",
            branch in ".*",
        ) {
            // Just ensure parsing doesn't panic - we don't care about the result
            let _ = Cli::try_parse_from([
                "covship",
                "upload",
                "--files",
                files.as_str(),
                "--api-url",
                api_url.as_str(),
                "--branch",
                branch.as_str(),
            ]);
        }

        /// Timeout parsing should accept any unsigned integer in string form
        #[test]
        fn timeout_accepts_unsigned_integers(timeout in 0u64..=86_400) {
            let timeout_str = timeout.to_string();
            let cli = Cli::try_parse_from([
                "covship",
                "upload",
                "--files",
                "coverage.out",
                "--timeout-secs",
                timeout_str.as_str(),
            ]);
            prop_assert!(cli.is_ok());
        }
    }
}
