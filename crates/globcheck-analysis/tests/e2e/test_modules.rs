use super::helpers::*;
use globcheck_analysis::{
    LoadError, LoadedModule, ModuleLoader, ModuleMode, NewGlobal, PreloadedModules, Warning,
};
use globcheck_core::{Kind, Value};
use globcheck_listing::Dialect;

// x = 1
// module("mymod")
// function hello()
//   return x
// end
// y = os.time()
const STRICT: &str = "
main <t.lua:0,0> (12 instructions, 48 bytes at 0x1)
0+ params, 2 slots, 0 upvalues, 0 locals, 8 constants, 1 function
\t1\t[1]\tLOADK    \t0 -1\t; 1
\t2\t[1]\tSETGLOBAL\t0 -2\t; x
\t3\t[2]\tGETGLOBAL\t0 -3\t; module
\t4\t[2]\tLOADK    \t1 -4\t; \"mymod\"
\t5\t[2]\tCALL     \t0 2 1
\t6\t[5]\tCLOSURE  \t0 0\t; 0x2
\t7\t[3]\tSETGLOBAL\t0 -5\t; hello
\t8\t[6]\tGETGLOBAL\t0 -6\t; os
\t9\t[6]\tGETTABLE \t0 0 -7\t; \"time\"
\t10\t[6]\tCALL     \t0 1 2
\t11\t[6]\tSETGLOBAL\t0 -8\t; y
\t12\t[6]\tRETURN   \t0 1
constants (8) for 0x1:
\t1\t1
\t2\t\"x\"
\t3\t\"module\"
\t4\t\"mymod\"
\t5\t\"hello\"
\t6\t\"os\"
\t7\t\"time\"
\t8\t\"y\"
locals (0) for 0x1:
upvalues (0) for 0x1:

function <t.lua:3,5> (3 instructions, 12 bytes at 0x2)
0 params, 2 slots, 0 upvalues, 0 locals, 1 constant, 0 functions
\t1\t[4]\tGETGLOBAL\t0 -1\t; x
\t2\t[4]\tRETURN   \t0 2
\t3\t[5]\tRETURN   \t0 1
constants (1) for 0x2:
\t1\t\"x\"
locals (0) for 0x2:
upvalues (0) for 0x2:
";

#[test]
fn e2e_strict_module_scope_starts_at_declaration() {
    let report = check(STRICT, Dialect::Lua51);
    let module = report.facts.remarks.module.as_ref().unwrap();
    assert_eq!(module.mode, ModuleMode::Strict);
    assert_eq!(module.name.as_deref(), Some("mymod"));
    assert_eq!(
        diagnostics(&report),
        vec![
            "1: undefined set x",
            "4: undefined get x",
            "6: undefined get os"
        ]
    );
}

#[test]
fn e2e_strict_module_exports_only_later_writes() {
    let report = check(STRICT, Dialect::Lua51);
    let module_writes: Vec<&str> = report
        .facts
        .references
        .iter()
        .filter(|r| r.is_write && r.line >= 2)
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(module_writes, vec!["hello", "y"]);
    // `x` was written to the outer environment, so it is not visible inside.
    assert!(!report.passed());
    assert!(report
        .diagnostics
        .iter()
        .any(|d| d.line == 4 && d.name == "x" && !d.is_write));
    assert!(!report.diagnostics.iter().any(|d| d.name == "hello" || d.name == "y"));
}

// x = 1
// module("mymod", package.seeall)
// function hello()
//   return x
// end
// y = os.time()
const OPEN: &str = "
main <t.lua:0,0> (14 instructions, 56 bytes at 0x1)
0+ params, 3 slots, 0 upvalues, 0 locals, 10 constants, 1 function
\t1\t[1]\tLOADK    \t0 -1\t; 1
\t2\t[1]\tSETGLOBAL\t0 -2\t; x
\t3\t[2]\tGETGLOBAL\t0 -3\t; module
\t4\t[2]\tLOADK    \t1 -4\t; \"mymod\"
\t5\t[2]\tGETGLOBAL\t2 -5\t; package
\t6\t[2]\tGETTABLE \t2 2 -6\t; \"seeall\"
\t7\t[2]\tCALL     \t0 3 1
\t8\t[5]\tCLOSURE  \t0 0\t; 0x2
\t9\t[3]\tSETGLOBAL\t0 -7\t; hello
\t10\t[6]\tGETGLOBAL\t0 -8\t; os
\t11\t[6]\tGETTABLE \t0 0 -9\t; \"time\"
\t12\t[6]\tCALL     \t0 1 2
\t13\t[6]\tSETGLOBAL\t0 -10\t; y
\t14\t[6]\tRETURN   \t0 1
constants (10) for 0x1:
\t1\t1
\t2\t\"x\"
\t3\t\"module\"
\t4\t\"mymod\"
\t5\t\"package\"
\t6\t\"seeall\"
\t7\t\"hello\"
\t8\t\"os\"
\t9\t\"time\"
\t10\t\"y\"
locals (0) for 0x1:
upvalues (0) for 0x1:

function <t.lua:3,5> (3 instructions, 12 bytes at 0x2)
0 params, 2 slots, 0 upvalues, 0 locals, 1 constant, 0 functions
\t1\t[4]\tGETGLOBAL\t0 -1\t; x
\t2\t[4]\tRETURN   \t0 2
\t3\t[5]\tRETURN   \t0 1
constants (1) for 0x2:
\t1\t\"x\"
locals (0) for 0x2:
upvalues (0) for 0x2:
";

#[test]
fn e2e_open_module_exports_every_write() {
    let report = check(OPEN, Dialect::Lua51);
    assert_eq!(
        report.facts.remarks.module.as_ref().map(|m| m.mode),
        Some(ModuleMode::Open)
    );
    assert!(report.passed(), "{:?}", report.diagnostics);
    for name in ["x", "hello", "y", "_M", "mymod"] {
        assert_eq!(report.definitions.get(name), Some(&Value::InModule), "{name}");
    }
}

// config = {}
// _END_GLOBALS = true
// late = 1
// print(config)
const END_GLOBALS: &str = "
main <t.lua:0,0> (10 instructions, 40 bytes at 0x1)
0+ params, 2 slots, 0 upvalues, 0 locals, 5 constants, 0 functions
\t1\t[1]\tNEWTABLE \t0 0 0
\t2\t[1]\tSETGLOBAL\t0 -1\t; config
\t3\t[2]\tLOADBOOL \t0 1 0
\t4\t[2]\tSETGLOBAL\t0 -2\t; _END_GLOBALS
\t5\t[3]\tLOADK    \t0 -3\t; 1
\t6\t[3]\tSETGLOBAL\t0 -4\t; late
\t7\t[4]\tGETGLOBAL\t0 -5\t; print
\t8\t[4]\tGETGLOBAL\t1 -1\t; config
\t9\t[4]\tCALL     \t0 2 1
\t10\t[4]\tRETURN   \t0 1
constants (5) for 0x1:
\t1\t\"config\"
\t2\t\"_END_GLOBALS\"
\t3\t1
\t4\t\"late\"
\t5\t\"print\"
locals (0) for 0x1:
upvalues (0) for 0x1:
";

#[test]
fn e2e_end_of_globals_marker() {
    let report = check(END_GLOBALS, Dialect::Lua51);
    assert_eq!(report.facts.remarks.end_of_globals, Some(2));
    assert_eq!(diagnostics(&report), vec!["3: undefined set late"]);
}

// local M = require("mod")
// M.field = 1
// return M
const ROUND_TRIP: &str = "
main <t.lua:0,0> (6 instructions, 24 bytes at 0x1)
0+ params, 2 slots, 0 upvalues, 1 local, 4 constants, 0 functions
\t1\t[1]\tGETGLOBAL\t0 -1\t; require
\t2\t[1]\tLOADK    \t1 -2\t; \"mod\"
\t3\t[1]\tCALL     \t0 2 2
\t4\t[2]\tSETTABLE \t0 -3 -4\t; \"field\" 1
\t5\t[3]\tRETURN   \t0 2
\t6\t[3]\tRETURN   \t0 1
constants (4) for 0x1:
\t1\t\"require\"
\t2\t\"mod\"
\t3\t\"field\"
\t4\t1
locals (1) for 0x1:
\t0\tM\t4\t6
upvalues (0) for 0x1:
";

#[test]
fn e2e_require_round_trip() {
    let mut modules = PreloadedModules::new();
    modules.insert("mod", Value::table());
    let whitelist = stdlib_for(Dialect::Lua51);
    let report = check_with(ROUND_TRIP, Dialect::Lua51, &whitelist, RESOLVE, &mut modules);
    assert!(report.passed(), "{:?}", report.diagnostics);
    assert_eq!(report.facts.requires.len(), 1);
    assert_eq!(report.facts.requires[0].alias.as_deref(), Some("M"));
    assert!(report.facts.known_locals.find("M").is_some());
    assert_eq!(
        report.definitions["M"].field("field"),
        Some(&Value::InModule)
    );
}

/// Pretends `mod` was loaded and left globals behind.
struct Polluting {
    globals: Vec<NewGlobal>,
}

impl ModuleLoader for Polluting {
    fn load(&mut self, _module: &str) -> Result<LoadedModule, LoadError> {
        let mut loaded = LoadedModule::new(Value::table());
        loaded.new_globals = self.globals.clone();
        Ok(loaded)
    }
}

#[test]
fn e2e_global_pollution_is_a_warning() {
    let mut loader = Polluting {
        globals: vec![
            NewGlobal {
                name: "mod".into(),
                is_module_value: true,
            },
            NewGlobal {
                name: "helper".into(),
                is_module_value: false,
            },
        ],
    };
    let whitelist = stdlib_for(Dialect::Lua51);
    let report = check_with(ROUND_TRIP, Dialect::Lua51, &whitelist, RESOLVE, &mut loader);
    assert!(report.passed());
    assert_eq!(
        report.warnings,
        vec![Warning::GlobalPollution {
            line: 1,
            module: "mod".into(),
            global: "helper".into(),
        }]
    );
    assert!(report.definitions.contains_key("mod"));
    assert!(!report.definitions.contains_key("helper"));
}

#[test]
fn e2e_whitelisted_table_needs_no_loader() {
    // local M = require("string") resolves against the whitelist.
    let text = ROUND_TRIP.replace("\"mod\"", "\"string\"");
    let whitelist = stdlib_for(Dialect::Lua51);
    let report = check_with(
        &text,
        Dialect::Lua51,
        &whitelist,
        RESOLVE,
        &mut PreloadedModules::new(),
    );
    assert!(report.warnings.is_empty());
    let m = report.definitions["M"].as_table().unwrap();
    assert_eq!(m.get("format"), Some(&Value::Scalar(Kind::Function)));
    assert_eq!(m.get("field"), Some(&Value::InModule));
}
