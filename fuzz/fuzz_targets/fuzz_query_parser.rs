#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing arbitrary text must fail cleanly, never panic
    if let Ok(query) = fxq::query::parse_query_string(data) {
        let _ = query.validate();
    }
});
