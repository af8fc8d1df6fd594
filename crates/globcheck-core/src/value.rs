//! Whitelist values: what a global is known to hold.

use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// Kind of a non-table whitelisted value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Function,
    String,
    Number,
    Boolean,
    Userdata,
    /// Declared without a type (plain-text whitelists, `true` in JSON).
    Any,
}

impl Kind {
    /// Parse a Lua `type()` name. `"table"` is not a kind; callers build a
    /// `Value::Table` for it.
    pub fn from_type_name(name: &str) -> Option<Kind> {
        match name {
            "function" => Some(Kind::Function),
            "string" => Some(Kind::String),
            "number" => Some(Kind::Number),
            "boolean" => Some(Kind::Boolean),
            "userdata" | "thread" => Some(Kind::Userdata),
            "any" | "nil" => Some(Kind::Any),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Kind::Function => "function",
            Kind::String => "string",
            Kind::Number => "number",
            Kind::Boolean => "boolean",
            Kind::Userdata => "userdata",
            Kind::Any => "any",
        }
    }
}

/// A whitelisted value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// A table with known fields.
    Table(Table),
    /// A concrete non-table value.
    Scalar(Kind),
    /// Legal in-module symbol: defined by the file being checked, not by the
    /// whitelist. Writes to it are never redefinitions.
    InModule,
}

impl Value {
    pub fn table() -> Value {
        Value::Table(Table::new())
    }

    /// True for values whose fields may be chained: tables and in-module
    /// symbols (whose shape is unknown).
    pub fn is_table_like(&self) -> bool {
        matches!(self, Value::Table(_) | Value::InModule)
    }

    /// True for the in-module marker.
    pub fn is_marker(&self) -> bool {
        matches!(self, Value::InModule)
    }

    pub fn as_table(&self) -> Option<&Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_table_mut(&mut self) -> Option<&mut Table> {
        match self {
            Value::Table(t) => Some(t),
            _ => None,
        }
    }

    /// Field lookup; `None` for non-tables.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.as_table().and_then(|t| t.get(name))
    }

    /// Deep merge: tables merge field by field, anything else is replaced.
    pub fn merge(&mut self, other: Value) {
        match (self, other) {
            (Value::Table(mine), Value::Table(theirs)) => mine.merge(theirs),
            (slot, other) => *slot = other,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Table(t) => write!(f, "table ({} fields)", t.len()),
            Value::Scalar(kind) => write!(f, "{}", kind.name()),
            Value::InModule => write!(f, "in-module"),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Table(t) => t.serialize(serializer),
            Value::Scalar(kind) => serializer.serialize_str(kind.name()),
            Value::InModule => serializer.serialize_str("in-module"),
        }
    }
}

/// Named fields of a whitelisted table, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    fields: IndexMap<String, Value>,
}

impl Table {
    pub fn new() -> Self {
        Table {
            fields: IndexMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(name.into(), value)
    }

    /// Set a value at a dotted path below this table, creating intermediate
    /// tables. A non-table intermediate is replaced by a table.
    pub fn insert_path(&mut self, path: &str, value: Value) {
        match path.split_once('.') {
            None => {
                self.insert(path, value);
            }
            Some((head, rest)) => {
                let slot = self
                    .fields
                    .entry(head.to_string())
                    .or_insert_with(Value::table);
                if !matches!(slot, Value::Table(_)) {
                    *slot = Value::table();
                }
                if let Value::Table(inner) = slot {
                    inner.insert_path(rest, value);
                }
            }
        }
    }

    /// Merge another table into this one, field by field.
    pub fn merge(&mut self, other: Table) {
        for (name, value) in other.fields {
            match self.fields.get_mut(&name) {
                Some(existing) => existing.merge(value),
                None => {
                    self.fields.insert(name, value);
                }
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Table {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl FromIterator<(String, Value)> for Table {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Table {
            fields: iter.into_iter().collect(),
        }
    }
}
