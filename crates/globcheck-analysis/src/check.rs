//! Whitelist resolution of a file's global references.
//!
//! The file's own definitions (require aliases, module tables, module
//! exports) go into a layer of the whitelist's `ScopeChain`; the shared
//! whitelist itself is never modified, so nothing carries over to the next
//! file.

use crate::extract::{Extractor, FileFacts, ModuleMode, Reference, MODULE};
use crate::loader::{LoadedModule, ModuleLoader, NewGlobal};
use crate::report::{Diagnostic, DiagnosticKind, FileReport, Warning};
use globcheck_core::{Resolution, ScopeChain, Value, Whitelist};
use globcheck_listing::Listing;
use indexmap::IndexMap;
use std::collections::HashSet;
use std::ops::RangeBounds;
use thiserror::Error;
use tracing::{debug, warn};

/// Globals every module scope defines.
const MODULE_FIELDS: [&str; 3] = ["_M", "_NAME", "_PACKAGE"];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Suppress undefined and redefinition diagnostics.
    pub tolerant: bool,
    /// Resolve `require`d modules to their exports.
    pub resolve_requires: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum OptionsError {
    #[error("tolerant mode needs require resolution (-l)")]
    TolerantWithoutResolution,
}

impl CheckOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if self.tolerant && !self.resolve_requires {
            return Err(OptionsError::TolerantWithoutResolution);
        }
        Ok(())
    }
}

pub struct Checker<'w> {
    whitelist: &'w Whitelist,
    options: CheckOptions,
}

impl<'w> Checker<'w> {
    pub fn new(whitelist: &'w Whitelist, options: CheckOptions) -> Result<Self, OptionsError> {
        options.validate()?;
        Ok(Checker { whitelist, options })
    }

    pub fn options(&self) -> CheckOptions {
        self.options
    }

    /// Check one file.
    pub fn check(&self, listing: &mut Listing, loader: &mut dyn ModuleLoader) -> FileReport {
        let facts = Extractor::new(listing.dialect, self.whitelist).extract(listing);
        let mut scope = self.whitelist.scope();
        scope.push_layer();
        let mut warnings = Vec::new();

        self.define_requires(&facts, &mut scope, loader, &mut warnings);
        if let Some(name) = &facts.remarks.implicit_module {
            define_module_table(&facts, name, &mut scope);
        }
        if let Some(decl) = facts
            .remarks
            .module
            .as_ref()
            .filter(|m| m.mode == ModuleMode::Open)
        {
            let exports = root_writes(&facts, ..);
            for name in exports.iter().map(String::as_str).chain(MODULE_FIELDS) {
                scope.define(name, Value::InModule);
            }
            if let Some(root) = decl.name.as_deref().and_then(|n| n.split('.').next()) {
                if scope.lookup(root).is_none() {
                    scope.define(root, Value::InModule);
                }
            }
        }
        if let Some(marker) = facts.remarks.end_of_globals {
            for name in root_writes(&facts, ..marker) {
                if scope.lookup(&name).is_none() {
                    scope.define(name, Value::InModule);
                }
            }
        }

        let definitions: IndexMap<String, Value> = scope
            .tip_entries()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect();

        let strict = facts
            .remarks
            .module
            .as_ref()
            .filter(|m| m.mode == ModuleMode::Strict);
        let mut references: Vec<&Reference> = facts.references.iter().collect();
        references.sort_by_key(|r| r.line);

        let mut seen = HashSet::new();
        let mut diagnostics = Vec::new();
        let mut narrowed = false;
        for reference in references {
            if let Some(decl) = strict {
                if !narrowed && reference.line >= decl.line {
                    debug!(line = decl.line, "entering strict module scope");
                    let entries = module_scope(&scope, &root_writes(&facts, decl.line..));
                    scope.push_barrier(entries);
                    narrowed = true;
                }
            }
            if let Some(diagnostic) = self.classify(&scope, reference) {
                if seen.insert(diagnostic.clone()) {
                    diagnostics.push(diagnostic);
                }
            }
        }

        FileReport {
            diagnostics,
            warnings,
            facts,
            definitions,
        }
    }

    fn classify(&self, scope: &ScopeChain<'_>, reference: &Reference) -> Option<Diagnostic> {
        if self.options.tolerant {
            return None;
        }
        match scope.resolve(&reference.name) {
            Resolution::Defined(value) | Resolution::Extends(value) => {
                (reference.is_write && !value.is_marker()).then(|| Diagnostic {
                    line: reference.line,
                    kind: DiagnosticKind::Redefined,
                    is_write: true,
                    name: reference.name.clone(),
                })
            }
            Resolution::Undefined { missing } => Some(Diagnostic {
                line: reference.line,
                kind: DiagnosticKind::Undefined,
                is_write: reference.is_write,
                name: missing,
            }),
        }
    }

    fn define_requires(
        &self,
        facts: &FileFacts,
        scope: &mut ScopeChain<'_>,
        loader: &mut dyn ModuleLoader,
        warnings: &mut Vec<Warning>,
    ) {
        for require in &facts.requires {
            if !self.options.resolve_requires {
                if let Some(alias) = &require.alias {
                    scope.define(alias.as_str(), Value::InModule);
                }
                continue;
            }
            let loaded = match self.whitelist.get_path(&require.module) {
                Some(value) if value.is_table_like() => Ok(LoadedModule::new(value.clone())),
                _ => loader.load(&require.module),
            };
            let module = match loaded {
                Ok(module) => module,
                Err(err) => {
                    warn!(line = require.line, module = %require.module, error = %err, "unresolved module");
                    warnings.push(Warning::UnresolvedModule {
                        line: require.line,
                        module: require.module.clone(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            debug!(module = %require.module, alias = ?require.alias, "resolved require");
            for global in &module.new_globals {
                if pollution_allowed(&require.module, global) {
                    define_module_global(scope, &require.module, global, &module.exports);
                } else {
                    warn!(module = %require.module, global = %global.name, "module pollutes globals");
                    warnings.push(Warning::GlobalPollution {
                        line: require.line,
                        module: require.module.clone(),
                        global: global.name.clone(),
                    });
                }
            }
            if let Some(alias) = &require.alias {
                scope.define(alias.as_str(), module.exports);
            }
        }
    }
}

/// Loading `a.b` may define the global `a`; loading `a` may define `a` only
/// as the module itself.
fn pollution_allowed(module: &str, global: &NewGlobal) -> bool {
    let root = module.split('.').next().unwrap_or(module);
    global.name == root && (global.is_module_value || module.contains('.'))
}

fn define_module_global(scope: &mut ScopeChain<'_>, module: &str, global: &NewGlobal, exports: &Value) {
    if global.is_module_value {
        scope.define(global.name.as_str(), exports.clone());
        return;
    }
    let mut value = match scope.lookup(&global.name) {
        Some(existing @ Value::Table(_)) => existing.clone(),
        _ => Value::table(),
    };
    if let (Some(table), Some((_, rest))) = (value.as_table_mut(), module.split_once('.')) {
        table.insert_path(rest, exports.clone());
    }
    scope.define(global.name.as_str(), value);
}

/// The table returned by the main chunk gets a field for every `name.field`
/// the file writes, wherever the write is.
fn define_module_table(facts: &FileFacts, name: &str, scope: &mut ScopeChain<'_>) {
    let mut value = match scope.lookup(name) {
        Some(existing @ Value::Table(_)) => existing.clone(),
        _ => Value::table(),
    };
    let prefix = format!("{name}.");
    if let Some(table) = value.as_table_mut() {
        for reference in facts.references.iter().filter(|r| r.is_write) {
            let Some(rest) = reference.name.strip_prefix(&prefix) else {
                continue;
            };
            match rest.split_once('.') {
                None => {
                    table.insert(rest, Value::InModule);
                }
                Some((field, _)) if !table.contains(field) => {
                    table.insert(field, Value::InModule);
                }
                Some(_) => {}
            }
        }
    }
    debug!(module = %name, "module table");
    scope.define(name, value);
}

/// Undotted global names written on `lines`, in first-write order.
fn root_writes(facts: &FileFacts, lines: impl RangeBounds<u32>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for reference in &facts.references {
        if reference.is_write
            && lines.contains(&reference.line)
            && !reference.name.contains('.')
            && !names.contains(&reference.name)
        {
            names.push(reference.name.clone());
        }
    }
    names
}

/// Everything visible inside a strict module: the globals written from the
/// declaration on, the file's own definitions, and `module` itself.
fn module_scope(scope: &ScopeChain<'_>, exports: &[String]) -> IndexMap<String, Value> {
    let mut entries: IndexMap<String, Value> = scope
        .tip_entries()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect();
    for name in exports.iter().map(String::as_str).chain(MODULE_FIELDS) {
        entries
            .entry(name.to_string())
            .or_insert(Value::InModule);
    }
    if let Some(module) = scope.lookup(MODULE) {
        entries
            .entry(MODULE.to_string())
            .or_insert_with(|| module.clone());
    }
    entries
}
