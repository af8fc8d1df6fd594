#![no_main]

use globcheck_listing::{Dialect, Listing};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Malformed listings must come back as errors, never panics.
    let text = String::from_utf8_lossy(data);
    for dialect in [Dialect::Lua51, Dialect::Lua52] {
        let _ = Listing::parse(&text, dialect);
    }
});
