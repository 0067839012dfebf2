//! Blocking HTTP client for the coverage ingestion endpoint.
//!
//! One POST per run, no retries: the request is either acknowledged with a
//! receipt or the error carries the remote status and body for the caller
//! to surface.

use covship_types::{REPORT_ID_FALLBACK, UploadReceipt};
use reqwest::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use std::time::Duration;

/// Path of the ingestion endpoint, joined onto the configured API URL.
pub const COVERAGE_ENDPOINT: &str = "/api/v1/coverage";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("failed to construct HTTP client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("coverage upload failed in transit: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("coverage upload rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },
    #[error("upload succeeded but the response could not be parsed: {source}; body: {body}")]
    MalformedResponse {
        #[source]
        source: serde_json::Error,
        body: String,
    },
}

// ============================================================================
// Client
// ============================================================================

/// Client bound to one API URL and key.
pub struct CoverageClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
}

impl CoverageClient {
    /// Build a client for `api_url`, tolerating a trailing slash.
    pub fn new(api_url: &str, api_key: String, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("covship/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ClientError::Build)?;
        let endpoint = format!("{}{COVERAGE_ENDPOINT}", api_url.trim_end_matches('/'));
        Ok(Self {
            http,
            endpoint,
            api_key,
        })
    }

    /// POST one encoded multipart body and parse the acknowledgement.
    ///
    /// The content length is set explicitly to the encoded byte count so the
    /// request is never chunked.
    pub fn upload(&self, boundary: &str, body: Vec<u8>) -> Result<UploadReceipt, ClientError> {
        let content_length = body.len();
        tracing::debug!(endpoint = %self.endpoint, bytes = content_length, "posting coverage payload");

        let response = self
            .http
            .post(&self.endpoint)
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .header(CONTENT_LENGTH, content_length)
            .body(body)
            .send()?;

        let status = response.status().as_u16();
        let text = response.text()?;
        parse_receipt(status, &text)
    }
}

// ============================================================================
// Response Parsing
// ============================================================================

/// Turn a raw status and body into a receipt.
///
/// Only 200 and 201 count as acknowledged. The report id prefers
/// `report_id`, falls back to `id`, then to [`REPORT_ID_FALLBACK`]; the
/// report URL defaults to empty. A body that is not a JSON object on a
/// success status is an error, not a silent default.
pub fn parse_receipt(status: u16, body: &str) -> Result<UploadReceipt, ClientError> {
    if status != 200 && status != 201 {
        return Err(ClientError::Rejected {
            status,
            body: body.to_string(),
        });
    }

    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|source| ClientError::MalformedResponse {
            source,
            body: body.to_string(),
        })?;

    let report_id = string_field(&value, "report_id")
        .or_else(|| string_field(&value, "id"))
        .unwrap_or_else(|| REPORT_ID_FALLBACK.to_string());
    let report_url = string_field(&value, "report_url").unwrap_or_default();

    Ok(UploadReceipt {
        report_id,
        report_url,
    })
}

/// A field rendered as a string; numeric ids are stringified.
fn string_field(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tests
// ============================================================================
