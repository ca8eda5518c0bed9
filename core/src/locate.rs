//! Block-body locators over emitted pseudocode lines.
//!
//! Every locator uses the same depth counting: any opener (`If`, `For`,
//! `While`, `DoBegin`) nests one level, any closer (`End if`, `End repeat`,
//! do-condition) leaves one. A closer seen at level zero belongs to the
//! construct being located. Kinds are never matched, so same-kind and
//! cross-kind nesting behave identically.

use crate::pseudocode::{Line, LineKind};

/// Branch partition of an if / else-if / else chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IfBranches<'a> {
    /// Lines between the header and the first same-level else clause
    pub true_branch: &'a [Line],
    /// Remaining clauses. Starts with the `Else if` header when the next
    /// clause is an else-if, so the chain lays out as a nested decision
    pub false_branch: &'a [Line],
    /// Index of the chain's terminator, or `lines.len()` when unterminated
    pub end: usize,
}

impl IfBranches<'_> {
    /// Number of branches in the whole chain, counting an implicit empty
    /// final else.
    pub fn arity(&self) -> usize {
        let mut count = 2;
        let mut rest = *self;
        while rest.false_branch.first().is_some_and(Line::is_else_clause) {
            rest = find_if_branches(rest.false_branch, 0);
            count += 1;
        }
        count
    }
}

/// Body of a loop construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopBody<'a> {
    pub body: &'a [Line],
    /// Index of the closing line
    pub end: usize,
}

/// Walk forward from `start + 1` and report each same-level else clause
/// candidate and the closer, following the shared depth rule.
fn scan(lines: &[Line], start: usize) -> (Option<usize>, Option<usize>) {
    let mut balance = 0usize;
    let mut else_at = None;

    for (i, line) in lines.iter().enumerate().skip(start + 1) {
        if line.is_opener() {
            balance += 1;
        } else if line.is_closer() {
            if balance == 0 {
                return (else_at, Some(i));
            }
            balance -= 1;
        } else if balance == 0 && else_at.is_none() && line.is_else_clause() {
            else_at = Some(i);
        }
    }
    (else_at, None)
}

/// Split the if chain whose header is `lines[start]`.
pub fn find_if_branches(lines: &[Line], start: usize) -> IfBranches<'_> {
    let (else_at, end) = scan(lines, start);
    let end = end.unwrap_or(lines.len());

    match else_at {
        Some(e) => {
            let from = if matches!(lines[e].kind, LineKind::Else) { e + 1 } else { e };
            IfBranches {
                true_branch: &lines[start + 1..e],
                false_branch: &lines[from..end],
                end,
            }
        }
        None => IfBranches {
            true_branch: lines.get(start + 1..end).unwrap_or(&[]),
            false_branch: &[],
            end,
        },
    }
}

/// Body of the for/while loop whose header is `lines[start]`.
///
/// A non-loop start yields an empty body ending at `start`; an unterminated
/// loop ends at the last line.
pub fn find_loop_body(lines: &[Line], start: usize) -> LoopBody<'_> {
    if !matches!(lines.get(start).map(|l| &l.kind), Some(LineKind::Loop { .. })) {
        return LoopBody { body: &[], end: start };
    }
    let end = scan(lines, start)
        .1
        .unwrap_or_else(|| lines.len().saturating_sub(1).max(start));
    LoopBody {
        body: lines.get(start + 1..end).unwrap_or(&[]),
        end,
    }
}

/// Body of the do-while whose begin marker is `lines[start]`, ending at its
/// own condition line. `None` when the condition line is missing.
pub fn find_do_body(lines: &[Line], start: usize) -> Option<LoopBody<'_>> {
    if !matches!(lines.get(start).map(|l| &l.kind), Some(LineKind::DoBegin)) {
        return None;
    }
    let end = scan(lines, start).1?;
    match lines[end].kind {
        LineKind::Decision { .. } => Some(LoopBody {
            body: &lines[start + 1..end],
            end,
        }),
        _ => None,
    }
}
