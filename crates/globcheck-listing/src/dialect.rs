//! Lua 5.1 and 5.2 opcodes as printed by `luac -l`, and the two dialects that
//! map them onto the operations the analyzer cares about.
//!
//! Lua 5.1 reaches globals through dedicated opcodes (`GETGLOBAL`,
//! `SETGLOBAL`) whose comment is the bare global name. Lua 5.2 has no global
//! opcodes: every global is a field of the `_ENV` upvalue, accessed with
//! `GETTABUP`/`SETTABUP`, and the comment names the upvalue followed by the
//! quoted key (`; _ENV "print"`). The same opcodes also index ordinary
//! upvalues (`; M "greet"`), which are not globals.

use crate::instruction::{CommentToken, Instruction};
use serde::Serialize;
use std::fmt;

/// Name of the implicit environment upvalue in Lua 5.2.
pub const ENV_UPVALUE: &str = "_ENV";

/// Every mnemonic of Lua 5.1 and 5.2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum OpCode {
    Move,
    LoadK,
    LoadKX,
    LoadBool,
    LoadNil,
    GetUpval,
    GetGlobal,
    GetTabUp,
    GetTable,
    SetGlobal,
    SetTabUp,
    SetUpval,
    SetTable,
    NewTable,
    Self_,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Unm,
    Not,
    Len,
    Concat,
    Jmp,
    Eq,
    Lt,
    Le,
    Test,
    TestSet,
    Call,
    TailCall,
    Return,
    ForLoop,
    ForPrep,
    TForCall,
    TForLoop,
    SetList,
    Close,
    Closure,
    VarArg,
    ExtraArg,
}

impl OpCode {
    pub const ALL: [OpCode; 43] = {
        use OpCode::*;
        [
            Move, LoadK, LoadKX, LoadBool, LoadNil, GetUpval, GetGlobal, GetTabUp, GetTable,
            SetGlobal, SetTabUp, SetUpval, SetTable, NewTable, Self_, Add, Sub, Mul, Div, Mod,
            Pow, Unm, Not, Len, Concat, Jmp, Eq, Lt, Le, Test, TestSet, Call, TailCall, Return,
            ForLoop, ForPrep, TForCall, TForLoop, SetList, Close, Closure, VarArg, ExtraArg,
        ]
    };

    /// Look up a mnemonic as printed by `luac`.
    pub fn from_name(name: &str) -> Option<OpCode> {
        OpCode::ALL.iter().copied().find(|op| op.name() == name)
    }

    pub fn name(&self) -> &'static str {
        use OpCode::*;
        match self {
            Move => "MOVE",
            LoadK => "LOADK",
            LoadKX => "LOADKX",
            LoadBool => "LOADBOOL",
            LoadNil => "LOADNIL",
            GetUpval => "GETUPVAL",
            GetGlobal => "GETGLOBAL",
            GetTabUp => "GETTABUP",
            GetTable => "GETTABLE",
            SetGlobal => "SETGLOBAL",
            SetTabUp => "SETTABUP",
            SetUpval => "SETUPVAL",
            SetTable => "SETTABLE",
            NewTable => "NEWTABLE",
            Self_ => "SELF",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Pow => "POW",
            Unm => "UNM",
            Not => "NOT",
            Len => "LEN",
            Concat => "CONCAT",
            Jmp => "JMP",
            Eq => "EQ",
            Lt => "LT",
            Le => "LE",
            Test => "TEST",
            TestSet => "TESTSET",
            Call => "CALL",
            TailCall => "TAILCALL",
            Return => "RETURN",
            ForLoop => "FORLOOP",
            ForPrep => "FORPREP",
            TForCall => "TFORCALL",
            TForLoop => "TFORLOOP",
            SetList => "SETLIST",
            Close => "CLOSE",
            Closure => "CLOSURE",
            VarArg => "VARARG",
            ExtraArg => "EXTRAARG",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for OpCode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// What an instruction means to the analyzer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum OpKind {
    /// Load a global (or, in 5.2, a field of an upvalue) into register A.
    GlobalRead,
    /// Store into a global (or, in 5.2, a field of an upvalue).
    GlobalWrite,
    /// Load upvalue B into register A.
    UpvalueRead,
    /// Store register A into upvalue B.
    UpvalueWrite,
    /// R(A) := R(B)[key]
    TableRead,
    /// R(A)[key] := value
    TableWrite,
    Call,
    /// R(A) := constant
    LoadConstant,
    VarArg,
    Return,
    Other,
}

/// Decoded name operand of a global-access instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GlobalName {
    /// A true global.
    Global(String),
    /// A field of a non-environment upvalue.
    Upvalue { upvalue: String, field: String },
}

/// Decoding adapter for one instruction-set dialect.
pub trait InstructionSet: Sync {
    fn dialect(&self) -> Dialect;

    /// Semantic category of an opcode, or `None` if the opcode does not
    /// exist in this dialect.
    fn kind(&self, op: OpCode) -> Option<OpKind>;

    /// Decode the name operand of a `GlobalRead`/`GlobalWrite` instruction.
    fn global_name(&self, ins: &Instruction) -> Option<GlobalName>;

    /// Name of the upvalue that stands for the global environment, if the
    /// dialect has one.
    fn env_upvalue(&self) -> Option<&'static str>;
}

/// Lua 5.1: explicit global opcodes.
pub struct Lua51Set;

/// Lua 5.2: globals through the `_ENV` upvalue.
pub struct Lua52Set;

fn common_kind(op: OpCode) -> OpKind {
    match op {
        OpCode::GetUpval => OpKind::UpvalueRead,
        OpCode::SetUpval => OpKind::UpvalueWrite,
        OpCode::GetTable | OpCode::Self_ => OpKind::TableRead,
        OpCode::SetTable => OpKind::TableWrite,
        OpCode::Call | OpCode::TailCall => OpKind::Call,
        OpCode::LoadK => OpKind::LoadConstant,
        OpCode::VarArg => OpKind::VarArg,
        OpCode::Return => OpKind::Return,
        _ => OpKind::Other,
    }
}

impl InstructionSet for Lua51Set {
    fn dialect(&self) -> Dialect {
        Dialect::Lua51
    }

    fn kind(&self, op: OpCode) -> Option<OpKind> {
        match op {
            OpCode::GetTabUp
            | OpCode::SetTabUp
            | OpCode::LoadKX
            | OpCode::TForCall
            | OpCode::ExtraArg => None,
            OpCode::GetGlobal => Some(OpKind::GlobalRead),
            OpCode::SetGlobal => Some(OpKind::GlobalWrite),
            other => Some(common_kind(other)),
        }
    }

    fn global_name(&self, ins: &Instruction) -> Option<GlobalName> {
        match ins.comment_tokens().into_iter().next()? {
            CommentToken::Word(name) => Some(GlobalName::Global(name)),
            CommentToken::Str(_) => None,
        }
    }

    fn env_upvalue(&self) -> Option<&'static str> {
        None
    }
}

impl InstructionSet for Lua52Set {
    fn dialect(&self) -> Dialect {
        Dialect::Lua52
    }

    fn kind(&self, op: OpCode) -> Option<OpKind> {
        match op {
            OpCode::GetGlobal | OpCode::SetGlobal | OpCode::Close => None,
            OpCode::GetTabUp => Some(OpKind::GlobalRead),
            OpCode::SetTabUp => Some(OpKind::GlobalWrite),
            other => Some(common_kind(other)),
        }
    }

    fn global_name(&self, ins: &Instruction) -> Option<GlobalName> {
        let mut tokens = ins.comment_tokens().into_iter();
        let CommentToken::Word(upvalue) = tokens.next()? else {
            return None;
        };
        // A register key prints as `-`; only constant keys have a name.
        let CommentToken::Str(field) = tokens.next()? else {
            return None;
        };
        if upvalue == ENV_UPVALUE {
            Some(GlobalName::Global(field))
        } else {
            Some(GlobalName::Upvalue { upvalue, field })
        }
    }

    fn env_upvalue(&self) -> Option<&'static str> {
        Some(ENV_UPVALUE)
    }
}

/// Supported instruction-set dialects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Dialect {
    #[default]
    Lua51,
    Lua52,
}

impl Dialect {
    /// The decoding adapter for this dialect.
    pub fn instruction_set(self) -> &'static dyn InstructionSet {
        match self {
            Dialect::Lua51 => &Lua51Set,
            Dialect::Lua52 => &Lua52Set,
        }
    }

    /// Parse a version string: `5.1`, `51`, `lua5.2`, or a `luac -v` banner
    /// such as `Lua 5.1.5  Copyright (C) 1994-2012 Lua.org, PUC-Rio`.
    pub fn from_version(text: &str) -> Option<Dialect> {
        let lower = text.trim().to_ascii_lowercase();
        let version = lower
            .strip_prefix("lua")
            .map(str::trim_start)
            .unwrap_or(&lower);
        if version.starts_with("5.1") || version == "51" {
            Some(Dialect::Lua51)
        } else if version.starts_with("5.2") || version == "52" {
            Some(Dialect::Lua52)
        } else {
            None
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Dialect::Lua51 => "Lua 5.1",
            Dialect::Lua52 => "Lua 5.2",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
