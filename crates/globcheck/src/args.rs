//! Command-line argument parser.
//!
//! Hand-rolled: short boolean flags bundle (`-tlv`), value flags take the
//! next argument or an attached value (`-wnames.txt`, `--whitelist=names.txt`).

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Output Mode
// =============================================================================

/// What to print for each analyzed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Undefined and redefined globals (default).
    #[default]
    Check,
    /// Cross-reference of every qualified name (`-x`).
    Xref,
    /// Extracted facts (`-d`).
    Dump,
    /// Decoded instructions for a source line range (`--lines A-B`).
    Lines { first: u32, last: u32 },
    PrintHelp,
    PrintVersion,
}

// =============================================================================
// Parsed Arguments
// =============================================================================

/// Flags exactly as given; environment and defaults are applied by
/// `Config::from_args`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Args {
    pub mode: Mode,
    pub tolerant: bool,
    pub resolve_requires: bool,
    pub whitelists: Vec<PathBuf>,
    pub modules: Vec<PathBuf>,
    pub no_stdlib: bool,
    pub no_loader: bool,
    pub json: bool,
    pub dialect: Option<String>,
    pub luac: Option<PathBuf>,
    pub lua: Option<PathBuf>,
    /// Repeat count of `-v`.
    pub verbose: u32,
    pub paths: Vec<PathBuf>,
}

// =============================================================================
// Parse Error
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ArgsError {
    #[error("option {0} needs a value")]
    MissingValue(&'static str),

    #[error("unknown option: {0}")]
    UnknownFlag(String),

    #[error("invalid line range '{0}' (expected A-B)")]
    BadRange(String),

    #[error("options {0} and {1} cannot be combined")]
    ConflictingModes(&'static str, &'static str),

    #[error("no input files")]
    NoInput,
}

// =============================================================================
// Parser Entry Point
// =============================================================================

/// Parse arguments, not including the program name.
pub fn parse_args<I, S>(args: I) -> Result<Args, ArgsError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let args: Vec<String> = args.into_iter().map(Into::into).collect();
    let mut result = Args::default();
    let mut i = 0;

    while i < args.len() {
        let arg = &args[i];
        i += 1;

        if arg == "--" {
            result.paths.extend(args[i..].iter().map(PathBuf::from));
            break;
        }
        if !arg.starts_with('-') || arg == "-" {
            result.paths.push(PathBuf::from(arg));
            continue;
        }

        if let Some(long) = arg.strip_prefix("--") {
            let (name, attached) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value.to_string())),
                None => (long, None),
            };
            let mut value = |flag: &'static str| -> Result<String, ArgsError> {
                if let Some(v) = attached.clone() {
                    return Ok(v);
                }
                let v = args.get(i).cloned().ok_or(ArgsError::MissingValue(flag))?;
                i += 1;
                Ok(v)
            };
            match name {
                "help" => return Ok(Args { mode: Mode::PrintHelp, ..result }),
                "version" => return Ok(Args { mode: Mode::PrintVersion, ..result }),
                "tolerant" => result.tolerant = true,
                "resolve-requires" => result.resolve_requires = true,
                "no-stdlib" => result.no_stdlib = true,
                "no-loader" => result.no_loader = true,
                "json" => result.json = true,
                "xref" => set_mode(&mut result, Mode::Xref)?,
                "dump" => set_mode(&mut result, Mode::Dump)?,
                "whitelist" => result.whitelists.push(value("--whitelist")?.into()),
                "modules" => result.modules.push(value("--modules")?.into()),
                "dialect" => result.dialect = Some(value("--dialect")?),
                "luac" => result.luac = Some(value("--luac")?.into()),
                "lua" => result.lua = Some(value("--lua")?.into()),
                "lines" => {
                    let range = value("--lines")?;
                    let (first, last) = parse_range(&range)?;
                    set_mode(&mut result, Mode::Lines { first, last })?;
                }
                _ => return Err(ArgsError::UnknownFlag(arg.clone())),
            }
            continue;
        }

        // Bundled short options.
        let flags: Vec<char> = arg[1..].chars().collect();
        let mut j = 0;
        while j < flags.len() {
            match flags[j] {
                'h' => return Ok(Args { mode: Mode::PrintHelp, ..result }),
                'V' => return Ok(Args { mode: Mode::PrintVersion, ..result }),
                't' => result.tolerant = true,
                'l' => result.resolve_requires = true,
                'v' => result.verbose += 1,
                'x' => set_mode(&mut result, Mode::Xref)?,
                'd' => set_mode(&mut result, Mode::Dump)?,
                flag @ ('w' | 'm') => {
                    let name = if flag == 'w' { "-w" } else { "-m" };
                    let path: PathBuf = if j + 1 < flags.len() {
                        flags[j + 1..].iter().collect::<String>().into()
                    } else {
                        let v = args.get(i).ok_or(ArgsError::MissingValue(name))?;
                        i += 1;
                        v.into()
                    };
                    if flag == 'w' {
                        result.whitelists.push(path);
                    } else {
                        result.modules.push(path);
                    }
                    break;
                }
                other => return Err(ArgsError::UnknownFlag(format!("-{other}"))),
            }
            j += 1;
        }
    }

    if result.paths.is_empty() {
        return Err(ArgsError::NoInput);
    }
    Ok(result)
}

fn set_mode(args: &mut Args, mode: Mode) -> Result<(), ArgsError> {
    match args.mode {
        Mode::Check => {
            args.mode = mode;
            Ok(())
        }
        current if current == mode => Ok(()),
        current => Err(ArgsError::ConflictingModes(mode_flag(current), mode_flag(mode))),
    }
}

fn mode_flag(mode: Mode) -> &'static str {
    match mode {
        Mode::Xref => "-x",
        Mode::Dump => "-d",
        Mode::Lines { .. } => "--lines",
        Mode::Check | Mode::PrintHelp | Mode::PrintVersion => "",
    }
}

fn parse_range(text: &str) -> Result<(u32, u32), ArgsError> {
    let bad = || ArgsError::BadRange(text.to_string());
    let (first, last) = match text.split_once('-') {
        Some((a, b)) => (a.trim().parse().map_err(|_| bad())?, b.trim().parse().map_err(|_| bad())?),
        None => {
            let line = text.trim().parse().map_err(|_| bad())?;
            (line, line)
        }
    };
    if first > last {
        return Err(bad());
    }
    Ok((first, last))
}

// =============================================================================
// Help Text
// =============================================================================

pub const USAGE: &str = "\
usage: globcheck [options] [--] file|dir|pattern...

Checks Lua sources for undefined and redefined globals, using the
bytecode listing produced by luac.

options:
  -t, --tolerant           report nothing about undefined or redefined
                           globals (needs -l)
  -l, --resolve-requires   resolve required modules to their exports
  -w, --whitelist FILE     extra whitelisted names (.json or text), repeatable
  -m, --modules FILE       pre-loaded module exports (.json or text), repeatable
      --no-stdlib          do not whitelist the Lua standard library
      --no-loader          never run lua to load required modules
  -x, --xref               print a cross-reference of global names
  -d, --dump               print the facts extracted from each file
      --lines A-B          print decoded instructions for source lines A to B
      --json               print one JSON object per file
      --dialect 5.1|5.2    bytecode dialect (default: detected from luac -v)
      --luac PATH          luac executable (env GLOBCHECK_LUAC)
      --lua PATH           lua executable (env GLOBCHECK_LUA)
  -v                       more logging, repeatable (env GLOBCHECK_LOG)
  -h, --help               show this help
  -V, --version            show the version

exit status: 0 all files passed, 1 a file failed, 2 usage or listing error
";

// =============================================================================
// Tests
// =============================================================================
