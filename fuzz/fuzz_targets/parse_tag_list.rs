#![no_main]

use libfuzzer_sys::fuzz_target;
use shelfmatch_core::normalize::try_parse_tag_list;

fuzz_target!(|data: &[u8]| {
    let Ok(raw) = std::str::from_utf8(data) else {
        return;
    };
    if let Ok(tags) = try_parse_tag_list(raw) {
        for tag in tags {
            assert_eq!(tag.trim(), tag);
            assert!(tag.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == ' ' || c == '-'));
        }
    }
});
