use super::helpers::*;
use globcheck_analysis::{Extractor, PreloadedModules};
use globcheck_core::{Kind, Value, Whitelist};
use globcheck_listing::{Dialect, Listing, ListingError};

// do local m = require "foo"; m.a = 1 end
// do local t = {}; t.b = 2 end
const SLOT_REUSE: &str = "
main <t.lua:0,0> (7 instructions, 28 bytes at 0x1)
0+ params, 2 slots, 0 upvalues, 2 locals, 6 constants, 0 functions
\t1\t[1]\tGETGLOBAL\t0 -1\t; require
\t2\t[1]\tLOADK    \t1 -2\t; \"foo\"
\t3\t[1]\tCALL     \t0 2 2
\t4\t[1]\tSETTABLE \t0 -3 -4\t; \"a\" 1
\t5\t[2]\tNEWTABLE \t0 0 0
\t6\t[2]\tSETTABLE \t0 -5 -6\t; \"b\" 2
\t7\t[2]\tRETURN   \t0 1
constants (6) for 0x1:
\t1\t\"require\"
\t2\t\"foo\"
\t3\t\"a\"
\t4\t1
\t5\t\"b\"
\t6\t2
locals (2) for 0x1:
\t0\tm\t4\t5
\t1\tt\t6\t7
upvalues (0) for 0x1:
";

#[test]
fn e2e_slot_reuse_does_not_leak_known_local() {
    let report = check(SLOT_REUSE, Dialect::Lua51);
    assert_eq!(
        references(&report),
        vec![(1, "require", false), (1, "m.a", true)]
    );
    let mut listing = Listing::parse(SLOT_REUSE, Dialect::Lua51).unwrap();
    let whitelist = stdlib_for(Dialect::Lua51);
    Extractor::new(Dialect::Lua51, &whitelist).extract(&mut listing);
    let locals = listing.main().unwrap().scope.locals();
    assert_eq!(locals[0].slot, locals[1].slot);
    assert!(locals[0].is_known());
    assert!(!locals[1].is_known());
}

// print(a)
// local t = {}
// b = t
// print(c, a)
const ORDER: &str = "
main <t.lua:0,0> (10 instructions, 40 bytes at 0x1)
0+ params, 4 slots, 0 upvalues, 1 local, 4 constants, 0 functions
\t1\t[1]\tGETGLOBAL\t0 -1\t; print
\t2\t[1]\tGETGLOBAL\t1 -2\t; a
\t3\t[1]\tCALL     \t0 2 1
\t4\t[2]\tNEWTABLE \t0 0 0
\t5\t[3]\tSETGLOBAL\t0 -3\t; b
\t6\t[4]\tGETGLOBAL\t1 -1\t; print
\t7\t[4]\tGETGLOBAL\t2 -4\t; c
\t8\t[4]\tGETGLOBAL\t3 -2\t; a
\t9\t[4]\tCALL     \t1 3 1
\t10\t[4]\tRETURN   \t0 1
constants (4) for 0x1:
\t1\t\"print\"
\t2\t\"a\"
\t3\t\"b\"
\t4\t\"c\"
locals (1) for 0x1:
\t0\tt\t5\t10
upvalues (0) for 0x1:
";

#[test]
fn e2e_diagnostics_are_in_line_order() {
    let report = check(ORDER, Dialect::Lua51);
    let lines: Vec<u32> = report.diagnostics.iter().map(|d| d.line).collect();
    assert!(lines.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        diagnostics(&report),
        vec![
            "1: undefined get a",
            "3: undefined set b",
            "4: undefined get c",
            "4: undefined get a",
        ]
    );
}

#[test]
fn e2e_whitelisted_paths_pass() {
    let mut whitelist = Whitelist::new();
    for name in ["print", "a", "b", "c"] {
        whitelist.insert(name, Value::Scalar(Kind::Any));
    }
    let report = check_with(
        ORDER,
        Dialect::Lua51,
        &whitelist,
        Default::default(),
        &mut PreloadedModules::new(),
    );
    // Writing a whitelisted name is still a redefinition.
    assert_eq!(diagnostics(&report), vec!["3: redefined set b"]);
}

#[test]
fn e2e_tolerant_mode_still_resolves() {
    let whitelist = stdlib_for(Dialect::Lua51);
    let mut modules = PreloadedModules::new();
    modules.insert("foo.a", Value::Scalar(Kind::Number));
    let report = check_with(SLOT_REUSE, Dialect::Lua51, &whitelist, TOLERANT, &mut modules);
    assert!(report.passed());
    assert!(report.definitions["m"].field("a").is_some());
    assert_eq!(report.facts.known_locals.len(), 1);
}

#[test]
fn e2e_listing_of_other_dialect_is_fatal() {
    let err = Listing::parse(SLOT_REUSE, Dialect::Lua52).unwrap_err();
    assert!(matches!(err, ListingError::WrongDialect { line: 4, .. }));
}
