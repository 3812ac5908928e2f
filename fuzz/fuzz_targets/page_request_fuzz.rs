//! Fuzz test for paging validation
//!
//! Any `(limit, offset, max_page_size)` either validates into a request
//! inside the bounds or is rejected. Nothing panics or wraps.
//!
//! Run with: cargo +nightly fuzz run page_request_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use questline_rank::PageRequest;

fuzz_target!(|input: (i64, i64, u32)| {
    let (limit, offset, max_page_size) = input;

    match PageRequest::new(limit, offset, max_page_size) {
        Ok(request) => {
            assert!(request.limit() >= 1);
            assert!(request.limit() <= max_page_size);
            assert_eq!(i64::from(request.limit()), limit);
            assert_eq!(request.offset() as i64, offset);
        }
        Err(_) => {
            assert!(limit < 1 || limit > i64::from(max_page_size) || offset < 0);
        }
    }
});
