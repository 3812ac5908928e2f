//! Fuzz test for cache key patterns
//!
//! Feeds arbitrary UTF-8 to the glob and regex constructors and matches the
//! result against arbitrary keys. Compilation may fail; matching must not
//! panic.
//!
//! Run with: cargo +nightly fuzz run key_pattern_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use questline_storage::KeyPattern;

fuzz_target!(|data: &[u8]| {
    let Ok(input) = std::str::from_utf8(data) else {
        return;
    };
    // First line is the pattern, the rest are keys
    let mut lines = input.lines();
    let Some(pattern) = lines.next() else {
        return;
    };
    let keys: Vec<&str> = lines.collect();

    let Ok(glob) = KeyPattern::glob(pattern) else {
        return;
    };
    let prefix = KeyPattern::prefix(pattern);
    let regex = KeyPattern::regex(pattern).ok();

    for key in keys {
        let _ = glob.matches(key);
        let _ = regex.as_ref().map(|r| r.matches(key));

        if !pattern.contains('*') {
            // A star-free glob is an exact match
            assert_eq!(glob.matches(key), key == pattern);
        }
        if prefix.matches(key) {
            assert!(key.starts_with(pattern));
        }
    }
});
