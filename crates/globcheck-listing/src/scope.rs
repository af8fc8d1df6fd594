//! Per-function local and upvalue tables, built from the `locals` and
//! `upvalues` sections that follow each function's instructions.
//!
//! `luac` prints locals in declaration order with 1-based liveness bounds:
//!
//! ```text
//! locals (2) for 0x...:
//! 	0	M	4	9
//! 	1	(for index)	5	8
//! ```
//!
//! The register a local lives in is not printed. It is recovered from the
//! declaration order: a local takes the lowest register not held by an
//! earlier local still alive at its start, and since Lua allocates locals as
//! a stack that is the number of such locals.

use serde::Serialize;
use std::collections::BTreeMap;

/// Index of a local within its function's `ScopeTable`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalId(pub usize);

/// A declared local and the register it occupies over its lifetime.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LocalSlot {
    pub slot: u32,
    /// Declaration index within the function.
    pub index: u32,
    pub name: String,
    /// First instruction the slot may hold the local; one before the
    /// declared start, where the defining instruction usually sits.
    pub live_from: u32,
    /// Last instruction the local is alive at (inclusive).
    pub live_to: u32,
    /// Dotted reference name, once the local is known to alias a module.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub known: Option<String>,
    #[serde(skip)]
    start: u32,
    #[serde(skip)]
    end: u32,
}

impl LocalSlot {
    pub fn is_known(&self) -> bool {
        self.known.is_some()
    }

    /// Name used for field accesses through this local.
    pub fn reference_name(&self) -> &str {
        self.known.as_deref().unwrap_or(&self.name)
    }

    /// Compiler-synthesized locals such as `(for index)`.
    pub fn is_internal(&self) -> bool {
        self.name.starts_with('(')
    }

    /// True if `index` is inside the declared range, without the one
    /// instruction of lead-in.
    fn declared_at(&self, index: u32) -> bool {
        self.start <= index && index < self.end
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UpvalueSlot {
    pub slot: u32,
    pub name: String,
}

/// Locals and upvalues of one function.
#[derive(Clone, Debug, Default)]
pub struct ScopeTable {
    locals: Vec<LocalSlot>,
    by_slot: BTreeMap<u32, Vec<LocalId>>,
    upvalues: Vec<UpvalueSlot>,
}

impl ScopeTable {
    pub fn new() -> Self {
        ScopeTable::default()
    }

    /// Add a local from its locals-section entry. `start` and `end` are the
    /// printed bounds: alive from instruction `start` up to, not including,
    /// `end`. Locals must be added in declaration order.
    pub fn add_local(&mut self, index: u32, name: &str, start: u32, end: u32) -> LocalId {
        let slot = self
            .locals
            .iter()
            .filter(|l| l.start <= start && start < l.end)
            .count() as u32;
        let id = LocalId(self.locals.len());
        self.locals.push(LocalSlot {
            slot,
            index,
            name: name.to_string(),
            live_from: start.saturating_sub(1),
            live_to: end,
            known: None,
            start,
            end,
        });
        self.by_slot.entry(slot).or_default().push(id);
        id
    }

    pub fn add_upvalue(&mut self, slot: u32, name: &str) {
        self.upvalues.push(UpvalueSlot {
            slot,
            name: name.to_string(),
        });
    }

    /// The local held in `slot` at instruction `index`.
    ///
    /// A local whose declared range contains `index` wins; otherwise the
    /// latest-starting local whose widened range `[live_from, live_to]`
    /// contains it. With `at_block_start` the start bound is ignored.
    /// Compiler-internal locals never match.
    pub fn match_local(&self, slot: u32, index: u32, at_block_start: bool) -> Option<LocalId> {
        let candidates = self.by_slot.get(&slot)?;
        let named = || {
            candidates
                .iter()
                .copied()
                .filter(|id| !self.locals[id.0].is_internal())
        };
        if at_block_start {
            return named().find(|id| index <= self.locals[id.0].live_to);
        }
        if let Some(id) = named().find(|id| self.locals[id.0].declared_at(index)) {
            return Some(id);
        }
        named()
            .filter(|id| {
                let l = &self.locals[id.0];
                l.live_from <= index && index <= l.live_to
            })
            .max_by_key(|id| self.locals[id.0].live_from)
    }

    pub fn local(&self, id: LocalId) -> &LocalSlot {
        &self.locals[id.0]
    }

    pub fn match_upvalue(&self, slot: u32) -> Option<&UpvalueSlot> {
        self.upvalues.iter().find(|u| u.slot == slot)
    }

    /// Mark a local as known under `alias`, or under its own name.
    pub fn promote_to_known(&mut self, id: LocalId, alias: Option<&str>) -> &LocalSlot {
        let local = &mut self.locals[id.0];
        local.known = Some(alias.unwrap_or(&local.name).to_string());
        local
    }

    pub fn locals(&self) -> &[LocalSlot] {
        &self.locals
    }

    pub fn upvalues(&self) -> &[UpvalueSlot] {
        &self.upvalues
    }
}

/// Parse a locals-section entry: `index name start end`. Names may contain
/// spaces (`(for index)`). Returns `None` for entries without a range.
pub fn parse_local_line(text: &str) -> Option<(u32, String, u32, u32)> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() < 4 {
        return None;
    }
    let index = tokens[0].parse().ok()?;
    let end = tokens[tokens.len() - 1].parse().ok()?;
    let start = tokens[tokens.len() - 2].parse().ok()?;
    let name = tokens[1..tokens.len() - 2].join(" ");
    Some((index, name, start, end))
}

/// Parse an upvalues-section entry: `index name` (5.1) or
/// `index name instack idx` (5.2).
pub fn parse_upvalue_line(text: &str) -> Option<(u32, String)> {
    let mut tokens = text.split_whitespace();
    let slot = tokens.next()?.parse().ok()?;
    let name = tokens.next()?;
    Some((slot, name.to_string()))
}

/// A local promoted to known, visible for the rest of the file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct KnownLocal {
    pub name: String,
    pub reference_name: String,
}

/// Known locals of a whole file, in promotion order.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct KnownLocals {
    entries: Vec<KnownLocal>,
}

impl KnownLocals {
    pub fn new() -> Self {
        KnownLocals::default()
    }

    pub fn record(&mut self, local: &LocalSlot) {
        self.entries.push(KnownLocal {
            name: local.name.clone(),
            reference_name: local.reference_name().to_string(),
        });
    }

    /// The most recent known local with this name.
    pub fn find(&self, name: &str) -> Option<&KnownLocal> {
        self.entries.iter().rev().find(|k| k.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KnownLocal> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
