#![no_main]

use globcheck_analysis::{CheckOptions, Checker, PreloadedModules};
use globcheck_core::stdlib;
use globcheck_listing::{Dialect, Listing};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let text = String::from_utf8_lossy(data);
    for (dialect, whitelist) in [
        (Dialect::Lua51, stdlib::lua51()),
        (Dialect::Lua52, stdlib::lua52()),
    ] {
        let Ok(mut listing) = Listing::parse(&text, dialect) else {
            continue;
        };
        let options = CheckOptions {
            tolerant: false,
            resolve_requires: true,
        };
        if let Ok(checker) = Checker::new(&whitelist, options) {
            let mut modules = PreloadedModules::new();
            modules.insert("fuzz", globcheck_core::Value::table());
            let _ = checker.check(&mut listing, &mut modules);
        }
    }
});
