use crate::dialect::Dialect;
use thiserror::Error;

/// The listing does not have the shape `luac -l -l` produces. Line numbers
/// are 1-based positions in the listing text, not source lines.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ListingError {
    #[error("listing line {line}: malformed instruction: {message}")]
    Malformed { line: usize, message: String },

    #[error("listing line {line}: unknown opcode `{name}`")]
    UnknownOpcode { line: usize, name: String },

    #[error("listing line {line}: opcode {op} does not exist in {dialect}")]
    WrongDialect {
        line: usize,
        op: String,
        dialect: Dialect,
    },

    #[error("listing line {line}: instruction outside of any function block")]
    Orphan { line: usize },

    #[error("listing line {line}: {section} section declares {expected} entries, found {found}")]
    TruncatedSection {
        line: usize,
        section: &'static str,
        expected: usize,
        found: usize,
    },
}

impl ListingError {
    pub fn line(&self) -> usize {
        match self {
            ListingError::Malformed { line, .. }
            | ListingError::UnknownOpcode { line, .. }
            | ListingError::WrongDialect { line, .. }
            | ListingError::Orphan { line }
            | ListingError::TruncatedSection { line, .. } => *line,
        }
    }
}
