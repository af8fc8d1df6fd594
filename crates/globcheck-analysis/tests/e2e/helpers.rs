use globcheck_analysis::{CheckOptions, Checker, FileReport, ModuleLoader, PreloadedModules};
use globcheck_core::{stdlib, Whitelist};
use globcheck_listing::{Dialect, Listing};

pub const RESOLVE: CheckOptions = CheckOptions {
    tolerant: false,
    resolve_requires: true,
};

pub const TOLERANT: CheckOptions = CheckOptions {
    tolerant: true,
    resolve_requires: true,
};

pub fn stdlib_for(dialect: Dialect) -> Whitelist {
    match dialect {
        Dialect::Lua51 => stdlib::lua51(),
        Dialect::Lua52 => stdlib::lua52(),
    }
}

/// Parse a listing and check it against `whitelist`.
pub fn check_with(
    text: &str,
    dialect: Dialect,
    whitelist: &Whitelist,
    options: CheckOptions,
    loader: &mut dyn ModuleLoader,
) -> FileReport {
    let mut listing = Listing::parse(text, dialect).unwrap_or_else(|e| {
        panic!("listing failed to parse: {e}\nlisting:\n{text}");
    });
    let checker = Checker::new(whitelist, options).unwrap();
    checker.check(&mut listing, loader)
}

/// Check against the standard library with default options.
pub fn check(text: &str, dialect: Dialect) -> FileReport {
    let whitelist = stdlib_for(dialect);
    check_with(
        text,
        dialect,
        &whitelist,
        CheckOptions::default(),
        &mut PreloadedModules::new(),
    )
}

/// Diagnostics as printed, without the file name.
pub fn diagnostics(report: &FileReport) -> Vec<String> {
    report.diagnostics.iter().map(|d| d.to_string()).collect()
}

/// References as `(line, name, is_write)`.
#[allow(dead_code)]
pub fn references(report: &FileReport) -> Vec<(u32, &str, bool)> {
    report
        .facts
        .references
        .iter()
        .map(|r| (r.line, r.name.as_str(), r.is_write))
        .collect()
}
