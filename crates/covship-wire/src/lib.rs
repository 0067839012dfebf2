//! Multipart form encoding for coverage uploads.
//!
//! The body is assembled by hand so the byte layout stays fixed: metadata
//! fields in a set order, optional context and pull request fields only when
//! present, then one part per coverage file carrying its base name and raw
//! content. Field values are inserted verbatim, with no character escaping;
//! a value containing the boundary token would corrupt the body. Known
//! limitation of the format as servers consume it today.

use covship_types::{PathContext, PullRequest};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

// ============================================================================
// Field Names
// ============================================================================

const FIELD_REPOSITORY: &str = "repository";
const FIELD_BRANCH: &str = "branch";
const FIELD_COMMIT_SHA: &str = "commit_sha";
const FIELD_COMMIT_MESSAGE: &str = "commit_message";
const FIELD_AUTHOR_NAME: &str = "author_name";
const FIELD_AUTHOR_EMAIL: &str = "author_email";
const FIELD_WORKING_DIRECTORY: &str = "working_directory";
const FIELD_GO_MODULE_PATH: &str = "go_module_path";
const FIELD_REPO_ROOT: &str = "repo_root";
const FIELD_PR_NUMBER: &str = "pr_number";
const FIELD_PR_BASE_BRANCH: &str = "pr_base_branch";
const FIELD_PR_BASE_SHA: &str = "pr_base_sha";
const FIELD_FILES: &str = "files[]";

/// File parts are sent as untyped binary.
const FILE_CONTENT_TYPE: &str = "application/octet-stream";

// ============================================================================
// Payload Inputs
// ============================================================================

/// Run metadata carried as plain form fields.
#[derive(Debug, Clone, Default)]
pub struct UploadMetadata {
    pub repository: String,
    pub branch: String,
    pub commit: covship_types::CommitInfo,
    pub pull_request: PullRequest,
}

/// One coverage file staged for upload.
#[derive(Debug, Clone)]
pub struct FilePart {
    /// Path as discovered; only the base name reaches the wire.
    pub path: PathBuf,
    pub content: Vec<u8>,
}

// ============================================================================
// Encoding
// ============================================================================

/// A boundary token unique to this invocation.
///
/// Uniqueness only needs to avoid colliding with content bytes, so the
/// current clock reading is enough.
pub fn generate_boundary() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("----covship-{nanos:x}")
}

/// Encode the full multipart body for one upload.
///
/// Metadata fields come first in a fixed order, then any context fields
/// that are present, then pull request fields, then the file parts in input
/// order, then the closing boundary marker. A `pr_number` that does not
/// parse as an unsigned integer is dropped rather than sent.
pub fn encode_multipart(
    boundary: &str,
    metadata: &UploadMetadata,
    context: Option<&PathContext>,
    files: &[FilePart],
) -> Vec<u8> {
    let mut body = Vec::new();

    push_text_field(&mut body, boundary, FIELD_REPOSITORY, &metadata.repository);
    push_text_field(&mut body, boundary, FIELD_BRANCH, &metadata.branch);
    push_text_field(&mut body, boundary, FIELD_COMMIT_SHA, &metadata.commit.sha);
    push_text_field(
        &mut body,
        boundary,
        FIELD_COMMIT_MESSAGE,
        &metadata.commit.message,
    );
    push_text_field(
        &mut body,
        boundary,
        FIELD_AUTHOR_NAME,
        &metadata.commit.author_name,
    );
    push_text_field(
        &mut body,
        boundary,
        FIELD_AUTHOR_EMAIL,
        &metadata.commit.author_email,
    );

    if let Some(context) = context {
        if let Some(dir) = &context.working_directory {
            push_text_field(&mut body, boundary, FIELD_WORKING_DIRECTORY, dir);
        }
        if let Some(module) = &context.module_path {
            push_text_field(&mut body, boundary, FIELD_GO_MODULE_PATH, module);
        }
        push_text_field(
            &mut body,
            boundary,
            FIELD_REPO_ROOT,
            &context.repo_root.display().to_string(),
        );
    }

    let pr = &metadata.pull_request;
    if let Some(number) = pr.number.as_deref().filter(|n| n.parse::<u64>().is_ok()) {
        push_text_field(&mut body, boundary, FIELD_PR_NUMBER, number);
    }
    if let Some(base_branch) = &pr.base_branch {
        push_text_field(&mut body, boundary, FIELD_PR_BASE_BRANCH, base_branch);
    }
    if let Some(base_sha) = &pr.base_sha {
        push_text_field(&mut body, boundary, FIELD_PR_BASE_SHA, base_sha);
    }

    for file in files {
        push_file_part(&mut body, boundary, file);
    }

    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    body
}

fn push_text_field(body: &mut Vec<u8>, boundary: &str, name: &str, value: &str) {
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
    );
    body.extend_from_slice(value.as_bytes());
    body.extend_from_slice(b"\r\n");
}

fn push_file_part(body: &mut Vec<u8>, boundary: &str, file: &FilePart) {
    let name = base_name(&file.path);
    body.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{FIELD_FILES}\"; filename=\"{name}\"\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {FILE_CONTENT_TYPE}\r\n\r\n").as_bytes());
    body.extend_from_slice(&file.content);
    body.extend_from_slice(b"\r\n");
}

fn base_name(path: &std::path::Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

// ============================================================================
// Tests
// ============================================================================


#[cfg(test)]
mod proptests {
    use super::*;
    use covship_types::CommitInfo;
    use proptest::prelude::*;

    fn printable() -> impl Strategy<Value = String> {
        "[a-zA-Z0-9 ./_-]{1,40}"
    }

    proptest! {
        // ====================================================================
        // Every metadata value reaches the body
        // ====================================================================

        #[test]
        fn all_metadata_values_appear(
            repository in printable(),
            branch in printable(),
            sha in printable(),
            message in printable(),
        ) {
            let metadata = UploadMetadata {
                repository: repository.clone(),
                branch: branch.clone(),
                commit: CommitInfo {
                    sha: sha.clone(),
                    message: message.clone(),
                    ..CommitInfo::default()
                },
                pull_request: PullRequest::default(),
            };

            let body = encode_multipart("----covship-pt", &metadata, None, &[]);
            let text = String::from_utf8(body).unwrap();

            prop_assert!(text.contains(&repository));
            prop_assert!(text.contains(&branch));
            prop_assert!(text.contains(&sha));
            prop_assert!(text.contains(&message));
        }

        #[test]
        fn pr_number_is_sent_iff_it_parses_as_an_unsigned_integer(
            number in prop_oneof!["[0-9]{1,10}", "[a-z#@ ]{1,10}"],
        ) {
            let metadata = UploadMetadata {
                pull_request: PullRequest {
                    number: Some(number.clone()),
                    ..PullRequest::default()
                },
                ..UploadMetadata::default()
            };

            let body = encode_multipart("----covship-pt", &metadata, None, &[]);
            let text = String::from_utf8(body).unwrap();

            prop_assert_eq!(
                text.contains("name=\"pr_number\""),
                number.parse::<u64>().is_ok()
            );
        }
    }
}
