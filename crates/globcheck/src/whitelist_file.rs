//! Whitelist and module-export files.
//!
//! `.json` files hold one object mapping names to values. Any other file is
//! plain text with one dotted name per line.

use globcheck_core::{Kind, Table, Value, Whitelist};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum WhitelistError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: invalid JSON: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{}: top level must be an object", path.display())]
    NotAnObject { path: PathBuf },

    #[error("{}:{line}: invalid global name '{name}'", path.display())]
    BadName {
        path: PathBuf,
        line: usize,
        name: String,
    },
}

/// Read one whitelist file.
pub fn load(path: &Path) -> Result<Whitelist, WhitelistError> {
    let text = fs::read_to_string(path).map_err(|source| WhitelistError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let whitelist = if path.extension().is_some_and(|ext| ext == "json") {
        parse_json(&text, path)?
    } else {
        parse_text(&text, path)?
    };
    debug!(file = %path.display(), globals = whitelist.len(), "loaded whitelist");
    Ok(whitelist)
}

/// Read and deep-merge several files; later files win.
pub fn load_all(paths: &[PathBuf]) -> Result<Whitelist, WhitelistError> {
    let mut merged = Whitelist::new();
    for path in paths {
        merged.merge(load(path)?);
    }
    Ok(merged)
}

pub fn parse_json(text: &str, path: &Path) -> Result<Whitelist, WhitelistError> {
    let root: serde_json::Value =
        serde_json::from_str(text).map_err(|source| WhitelistError::Json {
            path: path.to_path_buf(),
            source,
        })?;
    let serde_json::Value::Object(entries) = root else {
        return Err(WhitelistError::NotAnObject {
            path: path.to_path_buf(),
        });
    };
    let mut whitelist = Whitelist::new();
    for (name, value) in &entries {
        whitelist.insert(name.as_str(), json_value(value));
    }
    Ok(whitelist)
}

fn json_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Object(fields) => {
            let mut table = Table::new();
            for (name, field) in fields {
                table.insert(name.as_str(), json_value(field));
            }
            Value::Table(table)
        }
        serde_json::Value::Array(names) => {
            let mut table = Table::new();
            for name in names.iter().filter_map(serde_json::Value::as_str) {
                table.insert(name, Value::Scalar(Kind::Any));
            }
            Value::Table(table)
        }
        serde_json::Value::String(kind) if kind == "table" => Value::table(),
        serde_json::Value::String(kind) => Value::Scalar(Kind::from_type_name(kind).unwrap_or(Kind::Any)),
        _ => Value::Scalar(Kind::Any),
    }
}

pub fn parse_text(text: &str, path: &Path) -> Result<Whitelist, WhitelistError> {
    let mut whitelist = Whitelist::new();
    for (number, line) in text.lines().enumerate() {
        let name = line.split('#').next().unwrap_or("").trim();
        if name.is_empty() {
            continue;
        }
        if !name.split('.').all(is_identifier) {
            return Err(WhitelistError::BadName {
                path: path.to_path_buf(),
                line: number + 1,
                name: name.to_string(),
            });
        }
        // A bare name never clobbers fields listed earlier.
        if whitelist.get_path(name).is_none() {
            whitelist.insert_path(name, Value::Scalar(Kind::Any));
        }
    }
    Ok(whitelist)
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
