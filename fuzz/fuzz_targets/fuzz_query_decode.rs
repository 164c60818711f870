#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Anything that decodes must expand, validate and dump without panicking
    if let Ok(query) = fxq::decode_query(data) {
        let _ = query.validate();
        let _ = fxq::dump_query(&query);
    }
    let _ = fxq::decode_pre_search(data);
});
