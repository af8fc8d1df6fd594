//! Globcheck analysis: turns a parsed listing into qualified global
//! references and checks them against a whitelist.

pub mod check;
pub mod extract;
pub mod loader;
pub mod report;

pub use check::{CheckOptions, Checker, OptionsError};
pub use extract::{Extractor, FileFacts, ModuleDecl, ModuleMode, Reference, Remarks, Require};
pub use loader::{ChainLoader, LoadError, LoadedModule, ModuleLoader, NewGlobal, PreloadedModules};
pub use report::{Diagnostic, DiagnosticKind, FileReport, Warning};
