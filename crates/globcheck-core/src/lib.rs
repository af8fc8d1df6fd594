//! Globcheck core types: whitelist values, layered global scopes, and the
//! built-in Lua standard library tables.

pub mod stdlib;
pub mod value;
pub mod whitelist;

pub use value::{Kind, Table, Value};
pub use whitelist::{Resolution, ScopeChain, Whitelist};
