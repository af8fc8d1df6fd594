//! Global reference extraction.
//!
//! Each function's instructions are folded through a small state machine
//! (`Walk`) that reconstructs dotted names from chains of table accesses,
//! follows locals that alias modules or global tables, and records `require`
//! and `module` idioms. Functions are walked in listing order, main chunk
//! first, so locals promoted in an outer function are known by the time a
//! nested function reaches them through an upvalue.

use globcheck_core::Whitelist;
use globcheck_listing::{
    Dialect, FunctionBlock, GlobalName, Instruction, InstructionSet, KnownLocals, Listing,
    OpCode, OpKind, ScopeTable,
};
use serde::Serialize;
use tracing::{debug, trace};

/// The module-loading builtin.
pub const REQUIRE: &str = "require";
/// The module-declaration builtin.
pub const MODULE: &str = "module";
/// Writing this global marks the end of the file's global definitions.
pub const END_OF_GLOBALS: &str = "_END_GLOBALS";
/// `package.seeall` passed to `module` keeps the outer globals visible.
const SEEALL: &str = "seeall";

/// A read or write of a (possibly dotted) global name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub line: u32,
    pub name: String,
    pub is_write: bool,
}

/// A `require "name"` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Require {
    pub line: u32,
    pub module: String,
    /// The local receiving the module, if any.
    pub alias: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleMode {
    /// Only the module's own symbols are visible after the declaration.
    Strict,
    /// Every global the file writes is an export; outer globals stay visible.
    Open,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ModuleDecl {
    pub line: u32,
    pub name: Option<String>,
    pub mode: ModuleMode,
}

/// Per-file facts beyond the reference list.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct Remarks {
    pub module: Option<ModuleDecl>,
    /// Local returned by the main chunk as the module table.
    pub implicit_module: Option<String>,
    /// Line of the end-of-globals marker.
    pub end_of_globals: Option<u32>,
}

/// Everything extracted from one file.
#[derive(Clone, Debug, Default, Serialize)]
pub struct FileFacts {
    pub references: Vec<Reference>,
    pub requires: Vec<Require>,
    pub remarks: Remarks,
    pub known_locals: KnownLocals,
}

impl FileFacts {
    fn reference(&mut self, line: u32, name: impl Into<String>, is_write: bool) {
        self.references.push(Reference {
            line,
            name: name.into(),
            is_write,
        });
    }

    fn declare_module(&mut self, decl: ModuleDecl) {
        if self.remarks.module.is_none() {
            debug!(line = decl.line, name = ?decl.name, mode = ?decl.mode, "module declaration");
            self.remarks.module = Some(decl);
        }
    }
}

/// Extracts global references from listings of one dialect.
pub struct Extractor<'w> {
    set: &'static dyn InstructionSet,
    whitelist: &'w Whitelist,
}

/// Most recent load of a global, upvalue, or field, which a following table
/// access on the same register may chain off.
#[derive(Clone, Debug)]
struct Root {
    register: i32,
    name: String,
    line: u32,
    called: bool,
}

/// A register that was just loaded with a table-like value; if a local
/// turns out to live in it, that local becomes known under `name`.
#[derive(Clone, Debug)]
struct PendingAlias {
    slot: i32,
    name: String,
    created_at: u32,
}

/// State threaded through one function's instructions.
#[derive(Clone, Debug)]
struct Walk {
    last_root: Option<Root>,
    pending: Vec<PendingAlias>,
    at_function_start: bool,
}

impl Walk {
    fn start() -> Self {
        Walk {
            last_root: None,
            pending: Vec::new(),
            at_function_start: true,
        }
    }

    fn root(&mut self, register: i32, name: &str, line: u32) {
        self.last_root = Some(Root {
            register,
            name: name.to_string(),
            line,
            called: false,
        });
    }

    fn alias(&mut self, slot: i32, name: &str, created_at: u32) {
        self.pending.retain(|p| p.slot != slot);
        self.pending.push(PendingAlias {
            slot,
            name: name.to_string(),
            created_at,
        });
    }
}

/// Borrowed state of the function being walked.
struct Frame<'a> {
    code: &'a [Instruction],
    scope: &'a mut ScopeTable,
    facts: &'a mut FileFacts,
}

impl Frame<'_> {
    /// The known local held in `register` at instruction `index`.
    fn known_in(&self, register: i32, index: u32, at_start: bool) -> Option<String> {
        let slot = u32::try_from(register).ok()?;
        let local = self.scope.local(self.scope.match_local(slot, index, at_start)?);
        local.is_known().then(|| local.reference_name().to_string())
    }

    /// Name of upvalue `slot`, from the upvalues section or the comment.
    fn upvalue_name(&self, ins: &Instruction) -> Option<String> {
        ins.b
            .and_then(|b| u32::try_from(b).ok())
            .and_then(|b| self.scope.match_upvalue(b))
            .map(|u| u.name.clone())
            .or_else(|| ins.upvalue_name())
    }

    fn promote(&mut self, slot: i32, index: u32, alias: Option<&str>, at_start: bool) -> Option<String> {
        let slot = u32::try_from(slot).ok()?;
        let id = self.scope.match_local(slot, index, at_start)?;
        let local = self.scope.promote_to_known(id, alias);
        trace!(local = %local.name, reference = %local.reference_name(), "known local");
        self.facts.known_locals.record(local);
        Some(local.name.clone())
    }
}

impl<'w> Extractor<'w> {
    pub fn new(dialect: Dialect, whitelist: &'w Whitelist) -> Self {
        Extractor {
            set: dialect.instruction_set(),
            whitelist,
        }
    }

    fn kind(&self, ins: &Instruction) -> OpKind {
        self.set.kind(ins.op).unwrap_or(OpKind::Other)
    }

    /// Extract the facts of a whole file. Locals promoted to known are
    /// marked in the listing's scope tables.
    pub fn extract(&self, listing: &mut Listing) -> FileFacts {
        let mut facts = FileFacts::default();
        for (n, function) in listing.functions.iter_mut().enumerate() {
            let is_main = n == 0 && function.is_main();
            let FunctionBlock {
                instructions,
                scope,
                ..
            } = function;
            let mut frame = Frame {
                code: instructions.as_slice(),
                scope,
                facts: &mut facts,
            };
            if is_main {
                self.implicit_return(&mut frame);
            }
            let code = frame.code;
            code.iter()
                .enumerate()
                .fold(Walk::start(), |walk, (pos, ins)| {
                    self.step(walk, pos, ins, &mut frame)
                });
        }
        facts
    }

    /// A main chunk ending in an unconditional `return M` exports `M`.
    fn implicit_return(&self, frame: &mut Frame<'_>) {
        let code = frame.code;
        let [.., ret, end] = code else {
            return;
        };
        if self.kind(end) != OpKind::Return || end.b != Some(1) {
            return;
        }
        if self.kind(ret) != OpKind::Return || ret.b != Some(2) {
            return;
        }
        // A jump onto the final return means the `return M` is conditional.
        if code.iter().any(|i| i.jump_target() == Some(end.index)) {
            return;
        }
        if let Some(name) = frame.promote(ret.a, ret.index, None, false) {
            debug!(module = %name, "implicit module table");
            frame.facts.remarks.implicit_module = Some(name);
        }
    }

    fn step(&self, mut walk: Walk, pos: usize, ins: &Instruction, frame: &mut Frame<'_>) -> Walk {
        let kind = self.kind(ins);
        self.settle_aliases(&mut walk, ins, kind == OpKind::Call, frame);
        // Table accesses read their operand before overwriting it.
        if !matches!(kind, OpKind::TableRead | OpKind::TableWrite) {
            if let Some(root) = &walk.last_root {
                if overwrites(ins, root.register) {
                    walk.last_root = None;
                }
            }
        }
        match kind {
            OpKind::GlobalRead => self.global_read(&mut walk, pos, ins, frame),
            OpKind::GlobalWrite => self.global_write(&mut walk, ins, frame),
            OpKind::TableRead => self.table_access(&mut walk, ins, false, frame),
            OpKind::TableWrite => self.table_access(&mut walk, ins, true, frame),
            OpKind::UpvalueRead => self.upvalue_read(&mut walk, ins, frame),
            OpKind::UpvalueWrite => self.upvalue_write(&walk, ins, frame),
            OpKind::Call => {
                if let Some(root) = walk.last_root.as_mut() {
                    root.called = true;
                }
            }
            _ => {}
        }
        walk.at_function_start = false;
        walk
    }

    /// Promote aliases created by earlier instructions to the local now in
    /// their slot. A call may reuse the registers, so it drops them instead.
    fn settle_aliases(&self, walk: &mut Walk, ins: &Instruction, is_call: bool, frame: &mut Frame<'_>) {
        let (ready, fresh): (Vec<_>, Vec<_>) = std::mem::take(&mut walk.pending)
            .into_iter()
            .partition(|p| p.created_at < ins.index);
        walk.pending = fresh;
        if is_call {
            return;
        }
        for alias in ready {
            frame.promote(alias.slot, ins.index, Some(&alias.name), walk.at_function_start);
        }
    }

    fn global_read(&self, walk: &mut Walk, pos: usize, ins: &Instruction, frame: &mut Frame<'_>) {
        let name = match self.set.global_name(ins) {
            Some(GlobalName::Global(name)) => name,
            Some(GlobalName::Upvalue { upvalue, field }) => {
                return self.upvalue_field(walk, ins, &upvalue, &field, false, frame);
            }
            None => return,
        };
        frame.facts.reference(ins.line, &name, false);
        walk.root(ins.a, &name, ins.line);
        match name.as_str() {
            REQUIRE => self.require_call(pos, ins, frame),
            MODULE => self.module_call(pos, ins, frame),
            _ if self.whitelist.is_table(&name) => walk.alias(ins.a, &name, ins.index),
            _ => {}
        }
    }

    /// `require "name"`: a string constant, then a call on the same register.
    fn require_call(&self, pos: usize, ins: &Instruction, frame: &mut Frame<'_>) {
        let code = frame.code;
        let Some(load) = code.get(pos + 1) else {
            return;
        };
        if self.kind(load) != OpKind::LoadConstant {
            return;
        }
        let Some(module) = load.string_constant() else {
            return;
        };
        let Some(call) = code.get(pos + 2) else {
            return;
        };
        if self.kind(call) != OpKind::Call || call.a != ins.a {
            return;
        }
        // C == 2: exactly one result, kept in register A.
        let alias = if call.c == Some(2) {
            frame.promote(call.a, call.index, None, false)
        } else {
            None
        };
        debug!(line = ins.line, module = %module, alias = ?alias, "require");
        frame.facts.requires.push(Require {
            line: ins.line,
            module,
            alias,
        });
    }

    /// `module(...)` and `module()` are open; `module("name")` is strict
    /// unless `package.seeall` is among the arguments.
    fn module_call(&self, pos: usize, ins: &Instruction, frame: &mut Frame<'_>) {
        let code = frame.code;
        let Some(next) = code.get(pos + 1) else {
            return;
        };
        let decl = match self.kind(next) {
            OpKind::VarArg | OpKind::Call => ModuleDecl {
                line: ins.line,
                name: None,
                mode: ModuleMode::Open,
            },
            OpKind::LoadConstant => {
                let Some(name) = next.string_constant() else {
                    return;
                };
                let args = code[pos + 1..]
                    .iter()
                    .take_while(|c| !(self.kind(c) == OpKind::Call && c.a == ins.a));
                let seeall = args
                    .filter(|c| self.kind(c) == OpKind::TableRead)
                    .any(|c| c.string_constant().as_deref() == Some(SEEALL));
                ModuleDecl {
                    line: ins.line,
                    name: Some(name),
                    mode: if seeall {
                        ModuleMode::Open
                    } else {
                        ModuleMode::Strict
                    },
                }
            }
            _ => return,
        };
        frame.facts.declare_module(decl);
    }

    fn global_write(&self, walk: &mut Walk, ins: &Instruction, frame: &mut Frame<'_>) {
        match self.set.global_name(ins) {
            Some(GlobalName::Global(name)) if name == END_OF_GLOBALS => {
                frame.facts.remarks.end_of_globals.get_or_insert(ins.line);
            }
            Some(GlobalName::Global(name)) => frame.facts.reference(ins.line, name, true),
            Some(GlobalName::Upvalue { upvalue, field }) => {
                self.upvalue_field(walk, ins, &upvalue, &field, true, frame)
            }
            None => {}
        }
    }

    /// Field of a non-environment upvalue (`; M "greet"`), counted only when
    /// the upvalue is a known local.
    fn upvalue_field(
        &self,
        walk: &mut Walk,
        ins: &Instruction,
        upvalue: &str,
        field: &str,
        is_write: bool,
        frame: &mut Frame<'_>,
    ) {
        let Some(known) = frame.facts.known_locals.find(upvalue) else {
            return;
        };
        let name = format!("{}.{}", known.reference_name, field);
        frame.facts.reference(ins.line, &name, is_write);
        if !is_write {
            walk.root(ins.a, &name, ins.line);
            walk.alias(ins.a, &name, ins.index);
        }
    }

    fn table_access(&self, walk: &mut Walk, ins: &Instruction, is_write: bool, frame: &mut Frame<'_>) {
        // Reads index R(B) into R(A); writes index R(A).
        let (table, dest) = if is_write {
            (ins.a, None)
        } else {
            match ins.b {
                Some(b) => (b, Some(ins.a)),
                None => return,
            }
        };
        let Some(key) = ins.string_constant() else {
            if let (Some(dest), Some(root)) = (dest, &walk.last_root) {
                if root.register == dest {
                    walk.last_root = None;
                }
            }
            return;
        };

        let chained = walk
            .last_root
            .as_ref()
            .filter(|r| r.register == table && r.line == ins.line && !r.called)
            .map(|r| r.name.clone());
        let base = match chained {
            Some(root) => {
                walk.last_root = None;
                Some(root)
            }
            None => frame.known_in(table, ins.index, walk.at_function_start),
        };

        match base {
            Some(base) => {
                let name = format!("{base}.{key}");
                frame.facts.reference(ins.line, &name, is_write);
                if let Some(dest) = dest {
                    walk.root(dest, &name, ins.line);
                    walk.alias(dest, &name, ins.index);
                }
            }
            None => {
                if let (Some(dest), Some(root)) = (dest, &walk.last_root) {
                    if root.register == dest {
                        walk.last_root = None;
                    }
                }
            }
        }
    }

    /// `GETUPVAL` of a known local starts a chain.
    fn upvalue_read(&self, walk: &mut Walk, ins: &Instruction, frame: &mut Frame<'_>) {
        let Some(name) = frame.upvalue_name(ins) else {
            return;
        };
        if let Some(known) = frame.facts.known_locals.find(&name) {
            let reference = known.reference_name.clone();
            walk.root(ins.a, &reference, ins.line);
            walk.alias(ins.a, &reference, ins.index);
        }
    }

    /// Assigning the environment upvalue (`_ENV = M`) declares a strict
    /// module.
    fn upvalue_write(&self, walk: &Walk, ins: &Instruction, frame: &mut Frame<'_>) {
        let Some(env) = self.set.env_upvalue() else {
            return;
        };
        if frame.upvalue_name(ins).as_deref() != Some(env) {
            return;
        }
        let name = frame.known_in(ins.a, ins.index, walk.at_function_start);
        frame.facts.declare_module(ModuleDecl {
            line: ins.line,
            name,
            mode: ModuleMode::Strict,
        });
    }
}

/// True if `ins` stores into register `register`.
fn overwrites(ins: &Instruction, register: i32) -> bool {
    let a = ins.a;
    match ins.op {
        OpCode::Move
        | OpCode::LoadK
        | OpCode::LoadKX
        | OpCode::LoadBool
        | OpCode::GetUpval
        | OpCode::GetGlobal
        | OpCode::GetTabUp
        | OpCode::GetTable
        | OpCode::NewTable
        | OpCode::Add
        | OpCode::Sub
        | OpCode::Mul
        | OpCode::Div
        | OpCode::Mod
        | OpCode::Pow
        | OpCode::Unm
        | OpCode::Not
        | OpCode::Len
        | OpCode::Concat
        | OpCode::TestSet
        | OpCode::Closure
        | OpCode::ForPrep => register == a,
        OpCode::Self_ => register == a || register == a + 1,
        OpCode::ForLoop => register == a || register == a + 3,
        // 5.1 clears R(A)..R(B), 5.2 clears R(A)..R(A+B).
        OpCode::LoadNil => register >= a && register <= a + ins.b.unwrap_or(0).max(0),
        OpCode::Call | OpCode::VarArg | OpCode::TForCall | OpCode::TForLoop => register >= a,
        _ => false,
    }
}
