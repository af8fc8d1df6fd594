//! Built-in whitelists for the Lua 5.1 and 5.2 standard libraries.

use crate::value::{Kind, Value};
use crate::whitelist::Whitelist;

/// Base functions shared by 5.1 and 5.2.
const BASE_FUNCTIONS: &[&str] = &[
    "assert",
    "collectgarbage",
    "dofile",
    "error",
    "getmetatable",
    "ipairs",
    "load",
    "loadfile",
    "next",
    "pairs",
    "pcall",
    "print",
    "rawequal",
    "rawget",
    "rawset",
    "require",
    "select",
    "setmetatable",
    "tonumber",
    "tostring",
    "type",
    "xpcall",
    // 5.2 keeps these behind LUA_COMPAT_ALL, which stock builds enable.
    "module",
    "unpack",
    "loadstring",
];

const LUA51_FUNCTIONS: &[&str] = &["getfenv", "setfenv", "gcinfo", "newproxy"];

const LUA52_FUNCTIONS: &[&str] = &["rawlen"];

const COROUTINE: &[&str] = &["create", "resume", "running", "status", "wrap", "yield"];

const IO: &[&str] = &[
    "close", "flush", "input", "lines", "open", "output", "popen", "read", "tmpfile", "type",
    "write",
];

const MATH: &[&str] = &[
    "abs",
    "acos",
    "asin",
    "atan",
    "atan2",
    "ceil",
    "cos",
    "cosh",
    "deg",
    "exp",
    "floor",
    "fmod",
    "frexp",
    "ldexp",
    "log",
    "log10",
    "max",
    "min",
    "modf",
    "pow",
    "rad",
    "random",
    "randomseed",
    "sin",
    "sinh",
    "sqrt",
    "tan",
    "tanh",
];

const OS: &[&str] = &[
    "clock",
    "date",
    "difftime",
    "execute",
    "exit",
    "getenv",
    "remove",
    "rename",
    "setlocale",
    "time",
    "tmpname",
];

const STRING: &[&str] = &[
    "byte", "char", "dump", "find", "format", "gmatch", "gsub", "len", "lower", "match", "rep",
    "reverse", "sub", "upper",
];

const DEBUG_COMMON: &[&str] = &[
    "debug",
    "gethook",
    "getinfo",
    "getlocal",
    "getmetatable",
    "getregistry",
    "getupvalue",
    "sethook",
    "setlocal",
    "setmetatable",
    "setupvalue",
    "traceback",
];

const BIT32: &[&str] = &[
    "arshift", "band", "bnot", "bor", "btest", "bxor", "extract", "lrotate", "lshift", "replace",
    "rrotate", "rshift",
];

/// Globals of a stock Lua 5.1 interpreter.
pub fn lua51() -> Whitelist {
    let mut w = common();
    functions(&mut w, "", LUA51_FUNCTIONS);
    w.insert("_VERSION", Value::Scalar(Kind::String));
    functions(&mut w, "string", &["gfind"]);
    functions(
        &mut w,
        "table",
        &["concat", "foreach", "foreachi", "getn", "insert", "maxn", "remove", "setn", "sort"],
    );
    functions(&mut w, "debug", &["getfenv", "setfenv"]);
    functions(&mut w, "package", &["loadlib", "seeall"]);
    w.insert_path("package.loaders", Value::table());
    w
}

/// Globals of a stock Lua 5.2 interpreter (with 5.1 compatibility enabled).
pub fn lua52() -> Whitelist {
    let mut w = common();
    functions(&mut w, "", LUA52_FUNCTIONS);
    w.insert("_VERSION", Value::Scalar(Kind::String));
    functions(&mut w, "table", &["concat", "insert", "pack", "remove", "sort", "unpack", "maxn"]);
    functions(
        &mut w,
        "debug",
        &["getuservalue", "setuservalue", "upvalueid", "upvaluejoin"],
    );
    functions(&mut w, "package", &["loadlib", "searchpath", "seeall"]);
    w.insert_path("package.searchers", Value::table());
    w.insert_path("package.loaders", Value::table());
    functions(&mut w, "bit32", BIT32);
    w
}

fn common() -> Whitelist {
    let mut w = Whitelist::new();
    functions(&mut w, "", BASE_FUNCTIONS);
    w.insert("_G", Value::Scalar(Kind::Any));
    functions(&mut w, "coroutine", COROUTINE);
    functions(&mut w, "io", IO);
    for stream in ["stdin", "stdout", "stderr"] {
        w.insert_path(&format!("io.{stream}"), Value::Scalar(Kind::Userdata));
    }
    functions(&mut w, "math", MATH);
    w.insert_path("math.pi", Value::Scalar(Kind::Number));
    w.insert_path("math.huge", Value::Scalar(Kind::Number));
    functions(&mut w, "os", OS);
    functions(&mut w, "string", STRING);
    functions(&mut w, "debug", DEBUG_COMMON);
    for field in ["path", "cpath", "config"] {
        w.insert_path(&format!("package.{field}"), Value::Scalar(Kind::String));
    }
    w.insert_path("package.loaded", Value::table());
    w.insert_path("package.preload", Value::table());
    w
}

fn functions(w: &mut Whitelist, table: &str, names: &[&str]) {
    for name in names {
        if table.is_empty() {
            w.insert(*name, Value::Scalar(Kind::Function));
        } else {
            w.insert_path(&format!("{table}.{name}"), Value::Scalar(Kind::Function));
        }
    }
}
