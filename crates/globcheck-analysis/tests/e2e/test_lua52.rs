use super::helpers::*;
use globcheck_analysis::{ModuleMode, PreloadedModules};
use globcheck_core::{Kind, Value};
use globcheck_listing::Dialect;

// print(y)
// x = 1
const UNDEFINED: &str = "
main <t.lua:0,0> (5 instructions at 0x1)
0+ params, 2 slots, 1 upvalue, 0 locals, 4 constants, 0 functions
\t1\t[1]\tGETTABUP \t0 0 -1\t; _ENV \"print\"
\t2\t[1]\tGETTABUP \t1 0 -2\t; _ENV \"y\"
\t3\t[1]\tCALL     \t0 2 1
\t4\t[2]\tSETTABUP \t0 -3 -4\t; _ENV \"x\" 1
\t5\t[2]\tRETURN   \t0 1
constants (4) for 0x1:
\t1\t\"print\"
\t2\t\"y\"
\t3\t\"x\"
\t4\t1
locals (0) for 0x1:
upvalues (1) for 0x1:
\t0\t_ENV\t1\t0
";

#[test]
fn e2e_env_globals() {
    let report = check(UNDEFINED, Dialect::Lua52);
    assert_eq!(
        diagnostics(&report),
        vec!["1: undefined get y", "2: undefined set x"]
    );
}

// local M = {}
// function M.greet() print(M.name) end
// return M
const MODULE_TABLE: &str = "
main <t.lua:0,0> (5 instructions at 0x1)
0+ params, 2 slots, 1 upvalue, 1 local, 1 constant, 1 function
\t1\t[1]\tNEWTABLE \t0 0 0
\t2\t[2]\tCLOSURE  \t1 0\t; 0x2
\t3\t[2]\tSETTABLE \t0 -1 1\t; \"greet\" -
\t4\t[3]\tRETURN   \t0 2
\t5\t[3]\tRETURN   \t0 1
constants (1) for 0x1:
\t1\t\"greet\"
locals (1) for 0x1:
\t0\tM\t2\t6
upvalues (1) for 0x1:
\t0\t_ENV\t1\t0

function <t.lua:2,2> (4 instructions at 0x2)
0 params, 2 slots, 2 upvalues, 0 locals, 2 constants, 0 functions
\t1\t[2]\tGETTABUP \t0 0 -1\t; _ENV \"print\"
\t2\t[2]\tGETTABUP \t1 1 -2\t; M \"name\"
\t3\t[2]\tCALL     \t0 2 1
\t4\t[2]\tRETURN   \t0 1
constants (2) for 0x2:
\t1\t\"print\"
\t2\t\"name\"
locals (0) for 0x2:
upvalues (2) for 0x2:
\t0\t_ENV\t0\t0
\t1\tM\t1\t0
";

#[test]
fn e2e_returned_table_is_module() {
    let report = check(MODULE_TABLE, Dialect::Lua52);
    assert!(report.passed(), "{:?}", report.diagnostics);
    assert_eq!(report.facts.remarks.implicit_module.as_deref(), Some("M"));
    assert_eq!(
        report.definitions["M"].field("greet"),
        Some(&Value::InModule)
    );
    assert_eq!(
        references(&report),
        vec![
            (2, "M.greet", true),
            (2, "print", false),
            (2, "M.name", false)
        ]
    );
}

// local json = require "json"
// print(json.encode({}))
const REQUIRE: &str = "
main <t.lua:0,0> (9 instructions at 0x1)
0+ params, 4 slots, 1 upvalue, 1 local, 4 constants, 0 functions
\t1\t[1]\tGETTABUP \t0 0 -1\t; _ENV \"require\"
\t2\t[1]\tLOADK    \t1 -2\t; \"json\"
\t3\t[1]\tCALL     \t0 2 2
\t4\t[2]\tGETTABUP \t1 0 -3\t; _ENV \"print\"
\t5\t[2]\tGETTABLE \t2 0 -4\t; \"encode\"
\t6\t[2]\tNEWTABLE \t3 0 0
\t7\t[2]\tCALL     \t2 2 0
\t8\t[2]\tCALL     \t1 0 1
\t9\t[2]\tRETURN   \t0 1
constants (4) for 0x1:
\t1\t\"require\"
\t2\t\"json\"
\t3\t\"print\"
\t4\t\"encode\"
locals (1) for 0x1:
\t0\tjson\t4\t10
upvalues (1) for 0x1:
\t0\t_ENV\t1\t0
";

#[test]
fn e2e_require_through_env() {
    let mut modules = PreloadedModules::new();
    modules.insert("json.encode", Value::Scalar(Kind::Function));
    let whitelist = stdlib_for(Dialect::Lua52);
    let report = check_with(REQUIRE, Dialect::Lua52, &whitelist, RESOLVE, &mut modules);
    assert!(report.passed(), "{:?}", report.diagnostics);
    assert_eq!(report.facts.requires.len(), 1);
    assert_eq!(report.facts.requires[0].alias.as_deref(), Some("json"));
    assert_eq!(
        references(&report),
        vec![
            (1, "require", false),
            (2, "print", false),
            (2, "json.encode", false)
        ]
    );
}

// local M = {}
// _ENV = M
// function hello() print("hi") end
const ENV_MODULE: &str = "
main <t.lua:0,0> (5 instructions at 0x1)
0+ params, 2 slots, 1 upvalue, 1 local, 1 constant, 1 function
\t1\t[1]\tNEWTABLE \t0 0 0
\t2\t[2]\tSETUPVAL \t0 0\t; _ENV
\t3\t[3]\tCLOSURE  \t1 0\t; 0x2
\t4\t[3]\tSETTABUP \t0 -1 1\t; _ENV \"hello\" -
\t5\t[3]\tRETURN   \t0 1
constants (1) for 0x1:
\t1\t\"hello\"
locals (1) for 0x1:
\t0\tM\t2\t6
upvalues (1) for 0x1:
\t0\t_ENV\t1\t0

function <t.lua:3,3> (4 instructions at 0x2)
0 params, 2 slots, 1 upvalue, 0 locals, 2 constants, 0 functions
\t1\t[3]\tGETTABUP \t0 0 -1\t; _ENV \"print\"
\t2\t[3]\tLOADK    \t1 -2\t; \"hi\"
\t3\t[3]\tCALL     \t0 2 1
\t4\t[3]\tRETURN   \t0 1
constants (2) for 0x2:
\t1\t\"print\"
\t2\t\"hi\"
locals (0) for 0x2:
upvalues (1) for 0x2:
\t0\t_ENV\t0\t0
";

#[test]
fn e2e_env_replacement_narrows_scope() {
    let report = check(ENV_MODULE, Dialect::Lua52);
    let module = report.facts.remarks.module.as_ref().unwrap();
    assert_eq!(module.mode, ModuleMode::Strict);
    assert_eq!(module.line, 2);
    assert_eq!(diagnostics(&report), vec!["3: undefined get print"]);
}
