#![no_main]

use covship_client::parse_receipt;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to string, skipping invalid UTF-8
    if let Ok(text) = std::str::from_utf8(data) {
        // The parser should never panic, regardless of body content
        let _ = parse_receipt(200, text);
        let _ = parse_receipt(404, text);
    }
});
