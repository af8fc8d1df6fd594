//! Globcheck listing: dialect table, instruction parser, and per-function
//! scope tables for `luac -l -l` output.

pub mod dialect;
pub mod error;
pub mod instruction;
pub mod listing;
pub mod scope;

pub use dialect::{Dialect, GlobalName, InstructionSet, OpCode, OpKind};
pub use error::ListingError;
pub use instruction::{Instruction, Line};
pub use listing::{FunctionBlock, Listing};
pub use scope::{KnownLocal, KnownLocals, LocalId, LocalSlot, ScopeTable, UpvalueSlot};
