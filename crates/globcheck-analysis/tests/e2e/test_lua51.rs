use super::helpers::*;
use globcheck_analysis::{PreloadedModules, Warning};
use globcheck_core::{Kind, Value, Whitelist};
use globcheck_listing::Dialect;

// local a = y
// z.field = a
// print(a)
const UNDEFINED: &str = "
main <t.lua:0,0> (7 instructions, 28 bytes at 0x1)
0+ params, 3 slots, 0 upvalues, 1 local, 4 constants, 0 functions
\t1\t[1]\tGETGLOBAL\t0 -1\t; y
\t2\t[2]\tGETGLOBAL\t1 -2\t; z
\t3\t[2]\tSETTABLE \t1 -3 0\t; \"field\" -
\t4\t[3]\tGETGLOBAL\t1 -4\t; print
\t5\t[3]\tMOVE     \t2 0
\t6\t[3]\tCALL     \t1 2 1
\t7\t[3]\tRETURN   \t0 1
constants (4) for 0x1:
\t1\t\"y\"
\t2\t\"z\"
\t3\t\"field\"
\t4\t\"print\"
locals (1) for 0x1:
\t0\ta\t2\t7
upvalues (0) for 0x1:
";

#[test]
fn e2e_undefined_reads_and_writes() {
    let report = check(UNDEFINED, Dialect::Lua51);
    assert!(!report.passed());
    assert_eq!(
        diagnostics(&report),
        vec![
            "1: undefined get y",
            "2: undefined get z",
            "2: undefined set z",
        ]
    );
}

// local s = string
// s.frobnicate = 1
// print = nil
const REDEFINE: &str = "
main <t.lua:0,0> (5 instructions, 20 bytes at 0x1)
0+ params, 2 slots, 0 upvalues, 1 local, 4 constants, 0 functions
\t1\t[1]\tGETGLOBAL\t0 -1\t; string
\t2\t[2]\tSETTABLE \t0 -2 -3\t; \"frobnicate\" 1
\t3\t[3]\tLOADNIL  \t1 1
\t4\t[3]\tSETGLOBAL\t1 -4\t; print
\t5\t[3]\tRETURN   \t0 1
constants (4) for 0x1:
\t1\t\"string\"
\t2\t\"frobnicate\"
\t3\t1
\t4\t\"print\"
locals (1) for 0x1:
\t0\ts\t2\t5
upvalues (0) for 0x1:
";

#[test]
fn e2e_redefinitions_through_alias() {
    let report = check(REDEFINE, Dialect::Lua51);
    assert_eq!(
        diagnostics(&report),
        vec!["2: redefined set string.frobnicate", "3: redefined set print"]
    );
}

#[test]
fn e2e_tolerant_mode_hides_redefinitions() {
    let whitelist = stdlib_for(Dialect::Lua51);
    let report = check_with(
        REDEFINE,
        Dialect::Lua51,
        &whitelist,
        TOLERANT,
        &mut PreloadedModules::new(),
    );
    assert!(report.passed());
    assert_eq!(report.facts.references.len(), 3);
}

// globalTable.sub.field = 1
const DOTTED: &str = "
main <t.lua:0,0> (4 instructions, 16 bytes at 0x1)
0+ params, 2 slots, 0 upvalues, 0 locals, 4 constants, 0 functions
\t1\t[1]\tGETGLOBAL\t0 -1\t; globalTable
\t2\t[1]\tGETTABLE \t0 0 -2\t; \"sub\"
\t3\t[1]\tSETTABLE \t0 -3 -4\t; \"field\" 1
\t4\t[1]\tRETURN   \t0 1
constants (4) for 0x1:
\t1\t\"globalTable\"
\t2\t\"sub\"
\t3\t\"field\"
\t4\t1
locals (0) for 0x1:
upvalues (0) for 0x1:
";

#[test]
fn e2e_missing_intermediate_field() {
    let mut whitelist = Whitelist::new();
    whitelist.insert_path("globalTable.other", Value::Scalar(Kind::Function));
    let report = check_with(
        DOTTED,
        Dialect::Lua51,
        &whitelist,
        Default::default(),
        &mut PreloadedModules::new(),
    );
    assert_eq!(
        diagnostics(&report),
        vec!["1: undefined set globalTable.sub"]
    );
}

// local M = require "foo"
// local function go()
//   M.start()
// end
// go()
const UPVALUE: &str = "
main <t.lua:0,0> (8 instructions, 32 bytes at 0x1)
0+ params, 3 slots, 0 upvalues, 2 locals, 2 constants, 1 function
\t1\t[1]\tGETGLOBAL\t0 -1\t; require
\t2\t[1]\tLOADK    \t1 -2\t; \"foo\"
\t3\t[1]\tCALL     \t0 2 2
\t4\t[4]\tCLOSURE  \t1 0\t; 0x2
\t5\t[4]\tMOVE     \t0 0
\t6\t[5]\tMOVE     \t2 1
\t7\t[5]\tCALL     \t2 1 1
\t8\t[5]\tRETURN   \t0 1
constants (2) for 0x1:
\t1\t\"require\"
\t2\t\"foo\"
locals (2) for 0x1:
\t0\tM\t4\t8
\t1\tgo\t6\t8
upvalues (0) for 0x1:

function <t.lua:2,4> (4 instructions, 16 bytes at 0x2)
0 params, 2 slots, 1 upvalue, 0 locals, 1 constant, 0 functions
\t1\t[3]\tGETUPVAL \t0 0\t; M
\t2\t[3]\tGETTABLE \t0 0 -1\t; \"start\"
\t3\t[3]\tCALL     \t0 1 1
\t4\t[4]\tRETURN   \t0 1
constants (1) for 0x2:
\t1\t\"start\"
locals (0) for 0x2:
upvalues (1) for 0x2:
\t0\tM
";

fn foo_module() -> PreloadedModules {
    let mut modules = PreloadedModules::new();
    modules.insert("foo.start", Value::Scalar(Kind::Function));
    modules
}

#[test]
fn e2e_upvalue_of_required_module() {
    let whitelist = stdlib_for(Dialect::Lua51);
    let report = check_with(UPVALUE, Dialect::Lua51, &whitelist, RESOLVE, &mut foo_module());
    assert!(report.passed(), "{:?}", report.diagnostics);
    assert_eq!(
        references(&report),
        vec![(1, "require", false), (3, "M.start", false)]
    );
    assert!(report.definitions["M"].field("start").is_some());
}

#[test]
fn e2e_unresolved_module_leaves_alias_undefined() {
    let whitelist = stdlib_for(Dialect::Lua51);
    let report = check_with(
        UPVALUE,
        Dialect::Lua51,
        &whitelist,
        RESOLVE,
        &mut PreloadedModules::new(),
    );
    assert_eq!(
        report.warnings,
        vec![Warning::UnresolvedModule {
            line: 1,
            module: "foo".into(),
            reason: "module 'foo' not found".into(),
        }]
    );
    assert_eq!(diagnostics(&report), vec!["3: undefined get M"]);
}

#[test]
fn e2e_requires_unresolved_by_choice_are_opaque() {
    let report = check(UPVALUE, Dialect::Lua51);
    assert!(report.passed());
    assert!(report.warnings.is_empty());
    assert_eq!(report.definitions.get("M"), Some(&Value::InModule));
}

// x = os and ("s").len.foo
const REUSED_REGISTER: &str = "
main <t.lua:0,0> (8 instructions, 32 bytes at 0x1)
0+ params, 2 slots, 0 upvalues, 0 locals, 5 constants, 0 functions
\t1\t[1]\tGETGLOBAL\t0 -1\t; os
\t2\t[1]\tTEST     \t0 0 0
\t3\t[1]\tJMP      \t3\t; to 7
\t4\t[1]\tLOADK    \t0 -2\t; \"s\"
\t5\t[1]\tGETTABLE \t0 0 -3\t; \"len\"
\t6\t[1]\tGETTABLE \t0 0 -4\t; \"foo\"
\t7\t[1]\tSETGLOBAL\t0 -5\t; x
\t8\t[1]\tRETURN   \t0 1
constants (5) for 0x1:
\t1\t\"os\"
\t2\t\"s\"
\t3\t\"len\"
\t4\t\"foo\"
\t5\t\"x\"
locals (0) for 0x1:
upvalues (0) for 0x1:
";

#[test]
fn e2e_overwritten_register_breaks_chain() {
    let report = check(REUSED_REGISTER, Dialect::Lua51);
    assert_eq!(
        references(&report),
        vec![(1, "os", false), (1, "x", true)]
    );
    assert_eq!(diagnostics(&report), vec!["1: undefined set x"]);
}
