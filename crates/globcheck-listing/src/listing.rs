//! Reader for a whole `luac -p -l -l` listing.
//!
//! ```text
//! main <mod.lua:0,0> (5 instructions at 0x55c1)
//! 0+ params, 2 slots, 0 upvalues, 1 local, 2 constants, 0 functions
//! 	1	[1]	GETGLOBAL	0 -1	; require
//! 	...
//! constants (2) for 0x55c1:
//! 	1	"require"
//! locals (1) for 0x55c1:
//! 	0	M	4	6
//! upvalues (0) for 0x55c1:
//! function <mod.lua:3,5> (...)
//! ```
//!
//! Nested functions follow their parent's sections; every header starts a
//! new block.

use crate::dialect::Dialect;
use crate::error::ListingError;
use crate::instruction::{Instruction, Line};
use crate::scope::{parse_local_line, parse_upvalue_line, ScopeTable};

/// One function: its header, instructions, and scope table.
#[derive(Clone, Debug)]
pub struct FunctionBlock {
    pub header: String,
    pub instructions: Vec<Instruction>,
    pub scope: ScopeTable,
}

impl FunctionBlock {
    fn new(header: &str) -> Self {
        FunctionBlock {
            header: header.to_string(),
            instructions: Vec::new(),
            scope: ScopeTable::new(),
        }
    }

    pub fn is_main(&self) -> bool {
        self.header.starts_with("main <")
    }

    /// Source line range from the header (`<file:first,last>`); `0,0` for
    /// the main chunk.
    pub fn source_lines(&self) -> Option<(u32, u32)> {
        let open = self.header.find('<')?;
        let close = open + self.header[open..].find('>')?;
        let (_, range) = self.header[open + 1..close].rsplit_once(':')?;
        let (first, last) = range.split_once(',')?;
        Some((first.parse().ok()?, last.parse().ok()?))
    }
}

/// A parsed listing: function blocks in listing order, main first.
#[derive(Clone, Debug)]
pub struct Listing {
    pub dialect: Dialect,
    pub functions: Vec<FunctionBlock>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SectionKind {
    Constants,
    Locals,
    Upvalues,
}

impl SectionKind {
    fn name(self) -> &'static str {
        match self {
            SectionKind::Constants => "constants",
            SectionKind::Locals => "locals",
            SectionKind::Upvalues => "upvalues",
        }
    }

    fn from_header(line: &str) -> Option<(SectionKind, usize)> {
        let (kind, rest) = [
            SectionKind::Constants,
            SectionKind::Locals,
            SectionKind::Upvalues,
        ]
        .into_iter()
        .find_map(|k| Some((k, line.strip_prefix(k.name())?.strip_prefix(" (")?)))?;
        let count = rest.split_once(')')?.0.parse().ok()?;
        Some((kind, count))
    }
}

#[derive(Clone, Copy, Debug)]
enum Section {
    /// Before the first function header.
    Preamble,
    Code,
    Entries {
        kind: SectionKind,
        expected: usize,
        found: usize,
    },
}

impl Listing {
    /// Parse a listing, checking every opcode against `dialect`.
    pub fn parse(text: &str, dialect: Dialect) -> Result<Listing, ListingError> {
        let set = dialect.instruction_set();
        let mut functions: Vec<FunctionBlock> = Vec::new();
        let mut section = Section::Preamble;

        for (i, raw) in text.lines().enumerate() {
            let line_no = i + 1;
            let trimmed = raw.trim();

            if trimmed.starts_with("main <") || trimmed.starts_with("function <") {
                close_section(section, line_no)?;
                functions.push(FunctionBlock::new(trimmed));
                section = Section::Code;
                continue;
            }
            if let Some((kind, expected)) = SectionKind::from_header(trimmed) {
                close_section(section, line_no)?;
                section = Section::Entries {
                    kind,
                    expected,
                    found: 0,
                };
                continue;
            }

            if let Section::Entries {
                kind,
                expected,
                found,
            } = &mut section
            {
                if *found < *expected && trimmed.starts_with(|c: char| c.is_ascii_digit()) {
                    *found += 1;
                    if let Some(function) = functions.last_mut() {
                        add_entry(&mut function.scope, *kind, trimmed);
                    }
                    continue;
                }
            }

            match Instruction::parse_line(raw, line_no)? {
                Line::Boundary => {}
                Line::Instruction(ins) => {
                    let function = match (section, functions.last_mut()) {
                        (Section::Code, Some(function)) => function,
                        _ => return Err(ListingError::Orphan { line: line_no }),
                    };
                    if set.kind(ins.op).is_none() {
                        return Err(ListingError::WrongDialect {
                            line: line_no,
                            op: ins.op.name().to_string(),
                            dialect,
                        });
                    }
                    function.instructions.push(ins);
                }
            }
        }
        close_section(section, text.lines().count() + 1)?;

        Ok(Listing { dialect, functions })
    }

    /// The main chunk, if the listing has one.
    pub fn main(&self) -> Option<&FunctionBlock> {
        self.functions.first().filter(|f| f.is_main())
    }

    pub fn instruction_count(&self) -> usize {
        self.functions.iter().map(|f| f.instructions.len()).sum()
    }
}

fn add_entry(scope: &mut ScopeTable, kind: SectionKind, text: &str) {
    match kind {
        SectionKind::Constants => {}
        SectionKind::Locals => {
            if let Some((index, name, start, end)) = parse_local_line(text) {
                scope.add_local(index, &name, start, end);
            }
        }
        SectionKind::Upvalues => {
            if let Some((slot, name)) = parse_upvalue_line(text) {
                scope.add_upvalue(slot, &name);
            }
        }
    }
}

fn close_section(section: Section, line: usize) -> Result<(), ListingError> {
    match section {
        Section::Entries {
            kind,
            expected,
            found,
        } if found < expected => Err(ListingError::TruncatedSection {
            line,
            section: kind.name(),
            expected,
            found,
        }),
        _ => Ok(()),
    }
}
