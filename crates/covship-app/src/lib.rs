//! Orchestration of one coverage upload run.
//!
//! The pipeline is strictly sequential: discover files from the glob block,
//! infer the path context, read the file contents, encode one multipart
//! body, send it. Context inference never fails the run; discovery errors,
//! unreadable files, and transport failures do.

use covship_client::{ClientError, CoverageClient};
use covship_discovery::DiscoveryError;
use covship_types::{CommitInfo, PullRequest, UploadReceipt};
use covship_wire::{FilePart, UploadMetadata, encode_multipart, generate_boundary};
use std::path::PathBuf;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("failed to read coverage file {}: {source}", .path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Upload(#[from] ClientError),
}

// ============================================================================
// Request and Outcome
// ============================================================================

/// Everything one upload run needs, resolved by the caller beforehand.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Multi-line glob pattern block.
    pub patterns: String,
    /// Checkout root used for context inference.
    pub repo_root: PathBuf,
    /// Explicit working directory, overriding inference.
    pub working_dir: Option<String>,
    pub repository: String,
    pub branch: String,
    pub commit: CommitInfo,
    pub pull_request: PullRequest,
}

/// What the run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The remote acknowledged the payload.
    Uploaded(UploadReceipt),
    /// No pattern matched anything; nothing was sent.
    NothingToUpload,
}

// ============================================================================
// Upload Seam
// ============================================================================

/// Transport seam so the pipeline can be exercised without a network.
pub trait Uploader {
    fn upload(&self, boundary: &str, body: Vec<u8>) -> Result<UploadReceipt, ClientError>;
}

impl Uploader for CoverageClient {
    fn upload(&self, boundary: &str, body: Vec<u8>) -> Result<UploadReceipt, ClientError> {
        CoverageClient::upload(self, boundary, body)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Run one upload end to end.
///
/// Returns [`RunOutcome::NothingToUpload`] without touching the network when
/// discovery matches no files; the caller decides whether that is fatal.
pub fn run_upload(request: &UploadRequest, uploader: &dyn Uploader) -> Result<RunOutcome, AppError> {
    let files = covship_discovery::discover(&request.patterns)?;
    tracing::info!(count = files.len(), "coverage file discovery finished");
    if files.is_empty() {
        return Ok(RunOutcome::NothingToUpload);
    }

    let context = covship_context::resolve_context(
        &request.repo_root,
        &files,
        request.working_dir.as_deref(),
    );

    let mut parts = Vec::with_capacity(files.len());
    for path in files {
        let content = std::fs::read(&path).map_err(|source| AppError::FileRead {
            path: path.clone(),
            source,
        })?;
        parts.push(FilePart { path, content });
    }

    let metadata = UploadMetadata {
        repository: request.repository.clone(),
        branch: request.branch.clone(),
        commit: request.commit.clone(),
        pull_request: request.pull_request.clone(),
    };

    let boundary = generate_boundary();
    let body = encode_multipart(&boundary, &metadata, Some(&context), &parts);
    tracing::debug!(bytes = body.len(), parts = parts.len(), "multipart body encoded");

    let receipt = uploader.upload(&boundary, body)?;
    tracing::info!(report_id = %receipt.report_id, "coverage upload acknowledged");
    Ok(RunOutcome::Uploaded(receipt))
}

// ============================================================================
// Tests
// ============================================================================
