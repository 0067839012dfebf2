#![no_main]

use covship_context::parse_module_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Convert bytes to string, skipping invalid UTF-8
    if let Ok(text) = std::str::from_utf8(data) {
        // The parser should never panic, regardless of manifest content
        let _ = parse_module_line(text);
    }
});
