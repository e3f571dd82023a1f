#![no_main]

use libfuzzer_sys::fuzz_target;
use shelfmatch_search::tokenize;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let tokens = tokenize(text);
    assert_eq!(tokens, tokenize(text));
    for token in &tokens {
        assert!(!token.is_empty());
        assert!(token.chars().all(|c| c.is_alphanumeric() || c == '_'));
    }
});
