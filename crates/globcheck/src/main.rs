//! globcheck: finds undefined and redefined globals in Lua sources.

mod args;
mod config;
mod files;
mod lua_loader;
mod luac;
mod report;
mod whitelist_file;

use crate::args::{Mode, USAGE};
use crate::config::Config;
use crate::files::FilesError;
use crate::lua_loader::LuaProcessLoader;
use crate::luac::Disassembler;
use crate::report::{Printer, RunSummary};
use crate::whitelist_file::WhitelistError;
use globcheck_analysis::{ChainLoader, Checker, OptionsError, PreloadedModules};
use globcheck_core::{stdlib, Whitelist};
use globcheck_listing::{Dialect, Listing, ListingError};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{info, warn, Level};

const EXIT_FAILED: u8 = 1;
const EXIT_ERROR: u8 = 2;

/// Errors that end the whole run.
#[derive(Debug, Error)]
enum RunError {
    #[error(transparent)]
    Whitelist(#[from] WhitelistError),

    #[error(transparent)]
    Files(#[from] FilesError),

    #[error(transparent)]
    Options(#[from] OptionsError),

    #[error("{}: {source}", path.display())]
    Listing {
        path: PathBuf,
        #[source]
        source: ListingError,
    },

    #[error("cannot write output: {0}")]
    Output(#[from] io::Error),
}

fn main() -> ExitCode {
    let args = match args::parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("globcheck: {err}");
            eprintln!("try 'globcheck --help' for more information");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    match args.mode {
        Mode::PrintHelp => {
            print!("{USAGE}");
            return ExitCode::SUCCESS;
        }
        Mode::PrintVersion => {
            println!("globcheck {}", env!("CARGO_PKG_VERSION"));
            return ExitCode::SUCCESS;
        }
        _ => {}
    }

    let config = match Config::from_args(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("globcheck: {err}");
            return ExitCode::from(EXIT_ERROR);
        }
    };
    init_logging(config.log_level);

    match run(&config) {
        Ok(summary) if summary.passed() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::from(EXIT_FAILED),
        Err(err) => {
            eprintln!("globcheck: {err}");
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn init_logging(level: Level) {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

fn detect_dialect(luac: &Disassembler) -> Dialect {
    match luac.detect_dialect() {
        Ok(Some(dialect)) => dialect,
        Ok(None) => {
            warn!("unrecognized luac version, assuming {}", Dialect::default());
            Dialect::default()
        }
        Err(err) => {
            warn!(error = %err, "cannot detect luac version, assuming {}", Dialect::default());
            Dialect::default()
        }
    }
}

fn build_whitelist(config: &Config, dialect: Dialect) -> Result<Whitelist, WhitelistError> {
    let mut whitelist = match (config.stdlib, dialect) {
        (false, _) => Whitelist::new(),
        (true, Dialect::Lua51) => stdlib::lua51(),
        (true, Dialect::Lua52) => stdlib::lua52(),
    };
    whitelist.merge(whitelist_file::load_all(&config.whitelists)?);
    Ok(whitelist)
}

fn build_loader(config: &Config) -> Result<ChainLoader, WhitelistError> {
    let mut loader = ChainLoader::new();
    if !config.modules.is_empty() {
        let modules = whitelist_file::load_all(&config.modules)?;
        loader.push(Box::new(PreloadedModules::from_whitelist(modules)));
    }
    if config.process_loader {
        loader.push(Box::new(LuaProcessLoader::new(&config.lua)));
    }
    Ok(loader)
}

fn run(config: &Config) -> Result<RunSummary, RunError> {
    let luac = Disassembler::new(&config.luac);
    let dialect = config.dialect.unwrap_or_else(|| detect_dialect(&luac));
    info!(%dialect, luac = %config.luac.display(), "starting run");

    let whitelist = build_whitelist(config, dialect)?;
    let mut loader = build_loader(config)?;
    let checker = Checker::new(&whitelist, config.options)?;
    let files = files::collect(&config.paths)?;

    let stdout = io::stdout();
    let mut printer = Printer::new(stdout.lock(), config.json);
    let mut summary = RunSummary::default();

    for path in &files {
        let text = match luac.listing(path) {
            Ok(text) => text,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "skipping file");
                summary.skipped += 1;
                continue;
            }
        };
        let mut listing = Listing::parse(&text, dialect).map_err(|source| RunError::Listing {
            path: path.clone(),
            source,
        })?;

        if let Mode::Lines { first, last } = config.mode {
            printer.lines(path, &listing, first, last)?;
            continue;
        }

        let report = checker.check(&mut listing, &mut loader);
        summary.checked += 1;
        if !report.passed() {
            summary.failed += 1;
        }
        match config.mode {
            Mode::Xref => printer.xref(path, &report)?,
            Mode::Dump => printer.dump(path, &report)?,
            _ => printer.check(path, &report)?,
        }
    }

    if config.mode == Mode::Check {
        printer.summary(&summary)?;
    }
    printer.into_inner().flush()?;
    Ok(summary)
}
