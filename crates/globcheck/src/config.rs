//! Run configuration resolved from flags, then environment, then defaults.

use crate::args::{Args, Mode};
use globcheck_analysis::{CheckOptions, OptionsError};
use globcheck_listing::Dialect;
use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;

// =============================================================================
// Environment Variables
// =============================================================================

pub const ENV_LUAC: &str = "GLOBCHECK_LUAC";
pub const ENV_LUA: &str = "GLOBCHECK_LUA";
pub const ENV_DIALECT: &str = "GLOBCHECK_DIALECT";
pub const ENV_LOG: &str = "GLOBCHECK_LOG";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown dialect '{0}' (expected 5.1 or 5.2)")]
    BadDialect(String),

    #[error("unknown log level '{0}' in GLOBCHECK_LOG")]
    BadLogLevel(String),

    #[error(transparent)]
    Options(#[from] OptionsError),
}

// =============================================================================
// Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: Mode,
    pub options: CheckOptions,
    pub whitelists: Vec<PathBuf>,
    pub modules: Vec<PathBuf>,
    /// Whitelist the standard library of the dialect.
    pub stdlib: bool,
    /// Spawn `lua` for modules the pre-loaded exports do not cover.
    pub process_loader: bool,
    pub json: bool,
    /// `None` means detect from `luac -v`.
    pub dialect: Option<Dialect>,
    pub luac: PathBuf,
    pub lua: PathBuf,
    pub log_level: Level,
    pub paths: Vec<PathBuf>,
}

impl Config {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        Self::from_args_with_env(args, |name| std::env::var(name).ok())
    }

    /// Resolve against an explicit environment lookup.
    pub fn from_args_with_env(
        args: &Args,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let options = CheckOptions {
            tolerant: args.tolerant,
            resolve_requires: args.resolve_requires,
        };
        options.validate()?;

        let dialect = match args.dialect.clone().or_else(|| env(ENV_DIALECT)) {
            Some(text) => Some(parse_dialect(&text)?),
            None => None,
        };

        let log_level = match args.verbose {
            0 => match env(ENV_LOG) {
                Some(text) => text
                    .trim()
                    .parse::<Level>()
                    .map_err(|_| ConfigError::BadLogLevel(text.clone()))?,
                None => Level::WARN,
            },
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        Ok(Config {
            mode: args.mode,
            options,
            whitelists: args.whitelists.clone(),
            modules: args.modules.clone(),
            stdlib: !args.no_stdlib,
            process_loader: !args.no_loader,
            json: args.json,
            dialect,
            luac: args
                .luac
                .clone()
                .or_else(|| env(ENV_LUAC).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("luac")),
            lua: args
                .lua
                .clone()
                .or_else(|| env(ENV_LUA).map(PathBuf::from))
                .unwrap_or_else(|| PathBuf::from("lua")),
            log_level,
            paths: args.paths.clone(),
        })
    }
}

/// Accepts `5.1`, `51`, `lua5.1` and the like.
fn parse_dialect(text: &str) -> Result<Dialect, ConfigError> {
    let trimmed = text.trim();
    let version = trimmed
        .strip_prefix("lua")
        .or_else(|| trimmed.strip_prefix("Lua"))
        .unwrap_or(trimmed)
        .trim();
    match version {
        "5.1" | "51" => Ok(Dialect::Lua51),
        "5.2" | "52" => Ok(Dialect::Lua52),
        _ => Err(ConfigError::BadDialect(text.to_string())),
    }
}

// =============================================================================
// Tests
// =============================================================================
