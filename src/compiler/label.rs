//! The label resolver: turns the flat instruction/label stream into plain
//! instructions by assigning each label an address and rewriting every
//! label reference to the address it resolves to.
//!
//! Label markers are addressed by the instruction that follows them: a
//! label at the top of the stream, or immediately before another label,
//! resolves to the address of the next instruction actually emitted.
//! Three reference forms are supported: `name:f` (nearest matching label
//! at or after the reference, searching forward only), `name:b` (nearest
//! at or before the reference, searching backward only), and plain `name:`
//! (nearest occurrence in either direction, forward preferred on a tie).

use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::isa::Opcode;
use crate::logging::Diagnostic;

use super::process::{Instruction, Item, LabelRef, Operand};
use super::token::Token;

/// A fully resolved instruction: every operand is a plain number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInstruction {
    pub op: Opcode,
    pub operands: Vec<i64>,
}

struct LabelOccurrence {
    name: String,
    address: i64,
}

/// Resolve every label reference in `items`, returning the plain
/// instruction list addressed starting at `code_address`. `source_lines`
/// (the per-file raw text cached while processing) lets a resolution error
/// underline the offending label reference, same as every other diagnostic
/// category.
///
/// Every bad reference is collected, not just the first: the `Err` case
/// returns the full per-file diagnostic map, ready for `logging::report_errors`.
pub fn resolve_labels(
    items: Vec<Item>,
    code_address: i64,
    source_lines: &BTreeMap<PathBuf, Vec<String>>,
) -> Result<Vec<ResolvedInstruction>, BTreeMap<PathBuf, Vec<Diagnostic>>> {
    let mut occurrences: Vec<LabelOccurrence> = Vec::new();
    let mut instructions: Vec<Instruction> = Vec::new();
    let mut addresses: Vec<i64> = Vec::new();

    let mut address = code_address;
    let mut pending_labels: Vec<String> = Vec::new();

    for item in items {
        match item {
            Item::Label(marker) => {
                pending_labels.push(strip_marker(&marker.name).to_string());
            }
            Item::Instruction(instr) => {
                for name in pending_labels.drain(..) {
                    occurrences.push(LabelOccurrence { name, address });
                }
                addresses.push(address);
                instructions.push(instr);
                address += 2;
            }
        }
    }

    // Trailing labels with no instruction after them resolve to the address
    // one past the last instruction (the end of the code segment).
    for name in pending_labels.drain(..) {
        occurrences.push(LabelOccurrence { name, address });
    }

    let mut resolved = Vec::with_capacity(instructions.len());
    let mut errors: BTreeMap<PathBuf, Vec<Diagnostic>> = BTreeMap::new();
    for (instr, &instr_address) in instructions.iter().zip(addresses.iter()) {
        let mut operands = Vec::with_capacity(instr.operands.len());
        for operand in &instr.operands {
            match operand {
                Operand::Number(n) => operands.push(*n),
                Operand::LabelRef(label_ref) => {
                    match resolve_one(label_ref, instr_address, &occurrences, source_lines) {
                        Ok(address) => operands.push(address),
                        Err(diagnostic) => {
                            errors.entry(label_ref.file.clone()).or_default().push(diagnostic);
                        }
                    }
                }
            }
        }
        resolved.push(ResolvedInstruction { op: instr.op, operands });
    }

    if errors.values().any(|v| !v.is_empty()) {
        return Err(errors);
    }
    Ok(resolved)
}

fn strip_marker(text: &str) -> &str {
    Token::split_label_direction(text).0
}

fn diagnostic_for(label_ref: &LabelRef, message: impl Into<String>, source_lines: &BTreeMap<PathBuf, Vec<String>>) -> Diagnostic {
    let source_line = source_lines
        .get(&label_ref.file)
        .and_then(|lines| label_ref.line.checked_sub(1).and_then(|idx| lines.get(idx)));
    match (label_ref.token_span, source_line) {
        (Some(span), Some(source_line)) => Diagnostic::with_span(label_ref.line, message, span, source_line.clone()),
        _ => Diagnostic::new(label_ref.line, message),
    }
}

fn resolve_one(
    label_ref: &LabelRef,
    from_address: i64,
    occurrences: &[LabelOccurrence],
    source_lines: &BTreeMap<PathBuf, Vec<String>>,
) -> Result<i64, Diagnostic> {
    let (name, direction) = Token::split_label_direction(&label_ref.name);

    let candidates: Vec<&LabelOccurrence> = occurrences.iter().filter(|o| o.name == name).collect();
    if candidates.is_empty() {
        return Err(diagnostic_for(label_ref, format!("unknown label \"{}\"", name), source_lines));
    }

    // "forward" is strictly after the reference; "backward" includes the
    // reference's own address, matching the spec's `≤`/`>` split exactly.
    let backward = candidates.iter().filter(|o| o.address <= from_address).max_by_key(|o| o.address);
    let forward = candidates.iter().filter(|o| o.address > from_address).min_by_key(|o| o.address);

    let chosen = match direction {
        Some('b') => backward,
        Some('f') => forward,
        _ => backward.or(forward),
    };

    chosen.map(|o| o.address).ok_or_else(|| {
        diagnostic_for(
            label_ref,
            format!(
                "label \"{}\" not found when searching {}",
                name,
                match direction {
                    Some('b') => "backwards",
                    Some('f') => "forwards",
                    _ => "in either direction",
                },
            ),
            source_lines,
        )
    })
}
