//! Running `luac` to obtain bytecode listings.

use globcheck_listing::Dialect;
use std::ffi::OsStr;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("cannot run {tool}: {source}")]
    Launch {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed ({status}): {stderr}")]
    Failed {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("{tool} produced no output")]
    EmptyOutput { tool: String },
}

/// The listing compiler for one run.
#[derive(Debug, Clone)]
pub struct Disassembler {
    luac: PathBuf,
}

impl Disassembler {
    pub fn new(luac: impl Into<PathBuf>) -> Self {
        Disassembler { luac: luac.into() }
    }

    /// Full listing (`luac -p -l -l`) of one source file.
    pub fn listing(&self, source: &Path) -> Result<String, ToolError> {
        debug!(file = %source.display(), "disassembling");
        let output = self.run(&[OsStr::new("-p"), OsStr::new("-l"), OsStr::new("-l"), source.as_os_str()])?;
        if !output.status.success() {
            return Err(ToolError::Failed {
                tool: self.tool(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        if text.trim().is_empty() {
            return Err(ToolError::EmptyOutput { tool: self.tool() });
        }
        Ok(text)
    }

    /// The dialect `luac -v` reports, if it is one we read.
    pub fn detect_dialect(&self) -> Result<Option<Dialect>, ToolError> {
        let output = self.run(&[OsStr::new("-v")])?;
        // Some builds print the banner on stderr.
        let banner = [&output.stdout, &output.stderr]
            .into_iter()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .find(|text| !text.trim().is_empty())
            .ok_or_else(|| ToolError::EmptyOutput { tool: self.tool() })?;
        let dialect = Dialect::from_version(&banner);
        debug!(banner = banner.trim(), ?dialect, "luac version");
        Ok(dialect)
    }

    fn run(&self, args: &[&OsStr]) -> Result<Output, ToolError> {
        Command::new(&self.luac)
            .args(args)
            .output()
            .map_err(|source| ToolError::Launch {
                tool: self.tool(),
                source,
            })
    }

    fn tool(&self) -> String {
        self.luac.display().to_string()
    }
}
