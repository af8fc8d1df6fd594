use crate::extract::FileFacts;
use globcheck_core::Value;
use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticKind {
    Undefined,
    Redefined,
}

impl DiagnosticKind {
    pub fn name(self) -> &'static str {
        match self {
            DiagnosticKind::Undefined => "undefined",
            DiagnosticKind::Redefined => "redefined",
        }
    }
}

/// A finding about one global access.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Diagnostic {
    pub line: u32,
    pub kind: DiagnosticKind,
    pub is_write: bool,
    /// For undefined accesses, the shortest prefix that does not resolve.
    pub name: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let access = if self.is_write { "set" } else { "get" };
        write!(f, "{}: {} {} {}", self.line, self.kind.name(), access, self.name)
    }
}

/// Non-blocking problems found while checking a file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum Warning {
    UnresolvedModule {
        line: u32,
        module: String,
        reason: String,
    },
    GlobalPollution {
        line: u32,
        module: String,
        global: String,
    },
}

impl Warning {
    pub fn line(&self) -> u32 {
        match self {
            Warning::UnresolvedModule { line, .. } | Warning::GlobalPollution { line, .. } => *line,
        }
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnresolvedModule { line, reason, .. } => {
                write!(f, "{line}: warning: {reason}")
            }
            Warning::GlobalPollution {
                line,
                module,
                global,
            } => write!(
                f,
                "{line}: warning: loading module '{module}' defines global '{global}'"
            ),
        }
    }
}

/// Result of checking one file.
#[derive(Clone, Debug, Serialize)]
pub struct FileReport {
    pub diagnostics: Vec<Diagnostic>,
    pub warnings: Vec<Warning>,
    pub facts: FileFacts,
    /// Globals the file itself brought into scope: require aliases, module
    /// tables, and module exports.
    pub definitions: IndexMap<String, Value>,
}

impl FileReport {
    pub fn passed(&self) -> bool {
        self.diagnostics.is_empty()
    }
}
