//! Printing per-file results in each output mode, as text or JSON.

use globcheck_analysis::{FileReport, ModuleMode};
use globcheck_listing::{Instruction, Listing, OpKind};
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::{self, Write};
use std::path::Path;

/// Counts for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub checked: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl RunSummary {
    pub fn passed(&self) -> bool {
        self.failed == 0
    }
}

#[derive(Debug, Default, Serialize)]
struct XrefEntry {
    get: Vec<u32>,
    set: Vec<u32>,
}

#[derive(Serialize)]
struct DecodedInstruction<'a> {
    #[serde(flatten)]
    instruction: &'a Instruction,
    kind: Option<OpKind>,
}

pub struct Printer<W: Write> {
    out: W,
    json: bool,
}

impl<W: Write> Printer<W> {
    pub fn new(out: W, json: bool) -> Self {
        Printer { out, json }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn json_line(&mut self, value: &serde_json::Value) -> io::Result<()> {
        serde_json::to_writer(&mut self.out, value)?;
        writeln!(self.out)
    }

    pub fn check(&mut self, path: &Path, report: &FileReport) -> io::Result<()> {
        if self.json {
            return self.json_line(&json!({
                "file": path.display().to_string(),
                "passed": report.passed(),
                "diagnostics": report.diagnostics,
                "warnings": report.warnings,
            }));
        }
        let file = path.display();
        for warning in &report.warnings {
            writeln!(self.out, "{file}:{warning}")?;
        }
        for diagnostic in &report.diagnostics {
            writeln!(self.out, "{file}:{diagnostic}")?;
        }
        Ok(())
    }

    pub fn xref(&mut self, path: &Path, report: &FileReport) -> io::Result<()> {
        let mut names: BTreeMap<&str, XrefEntry> = BTreeMap::new();
        for reference in &report.facts.references {
            let entry = names.entry(reference.name.as_str()).or_default();
            let lines = if reference.is_write {
                &mut entry.set
            } else {
                &mut entry.get
            };
            if lines.last() != Some(&reference.line) {
                lines.push(reference.line);
            }
        }
        if self.json {
            return self.json_line(&json!({
                "file": path.display().to_string(),
                "xref": names,
            }));
        }
        writeln!(self.out, "{}:", path.display())?;
        let width = names.keys().map(|name| name.len()).max().unwrap_or(0);
        for (name, entry) in &names {
            let mut line = format!("  {name:<width$}");
            if !entry.get.is_empty() {
                line.push_str(&format!("  get {}", join(&entry.get)));
            }
            if !entry.set.is_empty() {
                line.push_str(&format!("  set {}", join(&entry.set)));
            }
            writeln!(self.out, "{line}")?;
        }
        Ok(())
    }

    pub fn dump(&mut self, path: &Path, report: &FileReport) -> io::Result<()> {
        if self.json {
            return self.json_line(&json!({
                "file": path.display().to_string(),
                "facts": report.facts,
                "definitions": report.definitions,
            }));
        }
        let facts = &report.facts;
        writeln!(self.out, "{}:", path.display())?;
        for require in &facts.requires {
            match &require.alias {
                Some(alias) => writeln!(
                    self.out,
                    "  require {} \"{}\" as {alias}",
                    require.line, require.module
                )?,
                None => writeln!(self.out, "  require {} \"{}\"", require.line, require.module)?,
            }
        }
        if let Some(module) = &facts.remarks.module {
            let mode = match module.mode {
                ModuleMode::Strict => "strict",
                ModuleMode::Open => "open",
            };
            writeln!(
                self.out,
                "  module {} {} {mode}",
                module.line,
                module.name.as_deref().unwrap_or("?")
            )?;
        }
        if let Some(name) = &facts.remarks.implicit_module {
            writeln!(self.out, "  implicit module {name}")?;
        }
        if let Some(line) = facts.remarks.end_of_globals {
            writeln!(self.out, "  end of globals {line}")?;
        }
        for known in facts.known_locals.iter() {
            writeln!(self.out, "  known local {} = {}", known.name, known.reference_name)?;
        }
        for (name, value) in &report.definitions {
            writeln!(self.out, "  defines {name}: {value}")?;
        }
        for reference in &facts.references {
            let access = if reference.is_write { "set" } else { "get" };
            writeln!(self.out, "  {} {access} {}", reference.line, reference.name)?;
        }
        Ok(())
    }

    /// Instructions whose source line is within `first..=last`.
    pub fn lines(&mut self, path: &Path, listing: &Listing, first: u32, last: u32) -> io::Result<()> {
        let set = listing.dialect.instruction_set();
        let in_range = |ins: &&Instruction| (first..=last).contains(&ins.line);
        if self.json {
            let functions: Vec<serde_json::Value> = listing
                .functions
                .iter()
                .filter(|f| f.instructions.iter().any(|ins| in_range(&ins)))
                .map(|f| {
                    let decoded: Vec<DecodedInstruction<'_>> = f
                        .instructions
                        .iter()
                        .filter(in_range)
                        .map(|instruction| DecodedInstruction {
                            instruction,
                            kind: set.kind(instruction.op),
                        })
                        .collect();
                    json!({ "header": f.header, "instructions": decoded })
                })
                .collect();
            return self.json_line(&json!({
                "file": path.display().to_string(),
                "functions": functions,
            }));
        }
        for function in &listing.functions {
            let selected: Vec<&Instruction> = function.instructions.iter().filter(in_range).collect();
            if selected.is_empty() {
                continue;
            }
            writeln!(self.out, "{}: {}", path.display(), function.header)?;
            for ins in selected {
                let mut text = format!("  {:>4} [{}] {:<9} {}", ins.index, ins.line, ins.op, ins.a);
                for operand in [ins.b, ins.c].into_iter().flatten() {
                    text.push_str(&format!(" {operand}"));
                }
                if let Some(comment) = &ins.comment {
                    text.push_str(&format!(" ; {comment}"));
                }
                match set.kind(ins.op) {
                    Some(kind) => text.push_str(&format!("  ({kind:?})")),
                    None => text.push_str("  (?)"),
                }
                writeln!(self.out, "{text}")?;
            }
        }
        Ok(())
    }

    pub fn summary(&mut self, summary: &RunSummary) -> io::Result<()> {
        if self.json {
            return Ok(());
        }
        let mut line = format!("{} file(s) checked, {} failed", summary.checked, summary.failed);
        if summary.skipped > 0 {
            line.push_str(&format!(", {} skipped", summary.skipped));
        }
        writeln!(self.out, "{line}")
    }
}

fn join(lines: &[u32]) -> String {
    lines
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
