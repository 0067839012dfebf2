#![no_main]

use covship_types::{CommitInfo, PullRequest};
use covship_wire::{FilePart, UploadMetadata, encode_multipart};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Split the input into metadata fields; lossy is fine for fuzzing
    let text = String::from_utf8_lossy(data).into_owned();
    let mut lines = text.splitn(4, '\n');
    let repository = lines.next().unwrap_or_default().to_string();
    let branch = lines.next().unwrap_or_default().to_string();
    let pr_number = lines.next().map(|s| s.to_string());
    let message = lines.next().unwrap_or_default().to_string();

    let metadata = UploadMetadata {
        repository,
        branch,
        commit: CommitInfo {
            message,
            ..CommitInfo::default()
        },
        pull_request: PullRequest {
            number: pr_number,
            ..PullRequest::default()
        },
    };

    let files = [FilePart {
        path: std::path::PathBuf::from("coverage.out"),
        content: data.to_vec(),
    }];

    // The encoder should never panic, and the body must always close
    let body = encode_multipart("----covship-fuzz", &metadata, None, &files);
    assert!(body.ends_with(b"--\r\n"));
});
