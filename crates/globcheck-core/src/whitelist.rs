//! The whitelist of known globals and the per-file scope chain layered on top
//! of it.
//!
//! A `Whitelist` is shared by every file of a run and never mutated while a
//! file is checked. Per-file additions (require aliases, module exports, the
//! implicit module table) live in `ScopeChain` layers that are dropped when
//! the file is done, so nothing leaks from one file into the next.

use crate::value::{Table, Value};
use indexmap::IndexMap;

/// Globals known to be defined, keyed by root name.
#[derive(Clone, Debug, Default)]
pub struct Whitelist {
    globals: Table,
}

impl Whitelist {
    pub fn new() -> Self {
        Whitelist {
            globals: Table::new(),
        }
    }

    /// Define a root global.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) {
        self.globals.insert(name, value);
    }

    /// Define a value at a dotted path, creating intermediate tables.
    pub fn insert_path(&mut self, path: &str, value: Value) {
        self.globals.insert_path(path, value);
    }

    /// Merge another whitelist into this one (tables merge field by field).
    pub fn merge(&mut self, other: Whitelist) {
        self.globals.merge(other.globals);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Walk a dotted path through nested tables.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('.');
        let mut value = self.globals.get(segments.next()?)?;
        for segment in segments {
            value = value.field(segment)?;
        }
        Some(value)
    }

    /// True if `path` names a table-like value. Only such globals can carry
    /// field accesses through a local alias.
    pub fn is_table(&self, path: &str) -> bool {
        self.get_path(path).is_some_and(Value::is_table_like)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.globals.contains(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.globals.iter()
    }

    pub fn len(&self) -> usize {
        self.globals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.globals.is_empty()
    }

    /// Start a per-file scope chain rooted at this whitelist.
    pub fn scope(&self) -> ScopeChain<'_> {
        ScopeChain {
            base: self,
            layers: Vec::new(),
        }
    }

    /// Consume the whitelist, returning its root table.
    pub fn into_table(self) -> Table {
        self.globals
    }
}

impl From<Table> for Whitelist {
    fn from(globals: Table) -> Self {
        Whitelist { globals }
    }
}

/// One override scope in a chain.
#[derive(Clone, Debug, Default)]
struct Layer {
    entries: IndexMap<String, Value>,
    /// Lookups do not descend below a barrier layer.
    barrier: bool,
}

/// Outcome of resolving a (possibly dotted) name.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<'a> {
    /// The full path resolves to this value.
    Defined(&'a Value),
    /// The root resolves and the path extends past known fields of this
    /// table-like (or opaque) value.
    Extends(&'a Value),
    /// `missing` is the shortest prefix of the path that does not resolve.
    Undefined { missing: String },
}

/// Layered lookup over a whitelist: layers are consulted tip first, down to
/// the first barrier, then the base whitelist if no barrier was crossed.
#[derive(Clone, Debug)]
pub struct ScopeChain<'w> {
    base: &'w Whitelist,
    layers: Vec<Layer>,
}

impl<'w> ScopeChain<'w> {
    /// Push an empty transparent layer.
    pub fn push_layer(&mut self) {
        self.layers.push(Layer::default());
    }

    /// Push a layer holding exactly `entries`, hiding everything below it.
    pub fn push_barrier(&mut self, entries: IndexMap<String, Value>) {
        self.layers.push(Layer {
            entries,
            barrier: true,
        });
    }

    pub fn pop_layer(&mut self) {
        self.layers.pop();
    }

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Define a root name in the tip layer.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        if self.layers.is_empty() {
            self.push_layer();
        }
        if let Some(tip) = self.layers.last_mut() {
            tip.entries.insert(name.into(), value);
        }
    }

    /// Tip-layer entries, in definition order.
    pub fn tip_entries(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.layers
            .last()
            .into_iter()
            .flat_map(|layer| layer.entries.iter().map(|(k, v)| (k.as_str(), v)))
    }

    /// Look up a root name.
    pub fn lookup(&self, name: &str) -> Option<&Value> {
        for layer in self.layers.iter().rev() {
            if let Some(value) = layer.entries.get(name) {
                return Some(value);
            }
            if layer.barrier {
                return None;
            }
        }
        self.base.get(name)
    }

    /// Resolve a dotted name segment by segment.
    pub fn resolve(&self, path: &str) -> Resolution<'_> {
        let mut segments = path.split('.');
        let root = segments.next().unwrap_or(path);
        let Some(mut current) = self.lookup(root) else {
            return Resolution::Undefined {
                missing: root.to_string(),
            };
        };
        let rest: Vec<&str> = segments.collect();
        let mut walked = root.len();
        for (i, segment) in rest.iter().enumerate() {
            let Value::Table(table) = current else {
                // Scalars and in-module symbols have no known shape.
                return Resolution::Extends(current);
            };
            walked += 1 + segment.len();
            match table.get(segment) {
                Some(value) => current = value,
                None if i + 1 == rest.len() => return Resolution::Extends(current),
                None => {
                    return Resolution::Undefined {
                        missing: path[..walked].to_string(),
                    }
                }
            }
        }
        Resolution::Defined(current)
    }
}
