//! Condition evaluation: a small disjunctive-normal-form machine.
//!
//! The walk carries `(required, observed, forbidden, mode)`. `-if` and
//! `-match` open a Match clause, `-unless` and `-avoid` open an Avoid
//! clause, `-and` raises the requirement, `-or` adds an alternative
//! without raising it. At each clause boundary the previous clause must
//! hold: Match needs `observed >= required`, Avoid needs `forbidden == 0`.

use crate::explore;
use crate::value::{self, Resolved};
use crate::Ctx;
use core_parse::NodeId;
use core_query::{Block, CompKind, Comparator, CondKind, Condition, Step, StepKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Match,
    Avoid,
}

pub(crate) fn conditions_pass(ctx: &Ctx<'_, '_>, block: &Block, node: NodeId, depth: usize) -> bool {
    if block.conditions.is_empty() {
        return true;
    }
    let mut mode = Mode::Match;
    let mut required = 0usize;
    let mut observed = 0usize;
    let mut forbidden = 0usize;
    let mut open = false;

    let clause_holds = |mode: Mode, required: usize, observed: usize, forbidden: usize| match mode {
        Mode::Match => observed >= required,
        Mode::Avoid => forbidden == 0,
    };

    for cond in &block.conditions {
        let opens = matches!(cond.kind, CondKind::If | CondKind::Unless);
        if opens {
            if open && !clause_holds(mode, required, observed, forbidden) {
                return false;
            }
            mode = if cond.kind == CondKind::If {
                Mode::Match
            } else {
                Mode::Avoid
            };
            required = 1;
            observed = 0;
            forbidden = 0;
            open = true;
        } else if cond.kind == CondKind::And {
            required += 1;
        }

        if test_condition(ctx, cond, node, depth) {
            match mode {
                Mode::Match => observed += 1,
                Mode::Avoid => forbidden += 1,
            }
        }
    }
    clause_holds(mode, required, observed, forbidden)
}

fn test_condition(ctx: &Ctx<'_, '_>, cond: &Condition, node: NodeId, depth: usize) -> bool {
    match &cond.comparator {
        None => bare_test(ctx, &cond.step, node, depth),
        Some(comparator) => compare(ctx, &cond.step, comparator, node, depth),
    }
}

/// Without a comparator, a condition tests presence: a variable must be
/// set (even to the empty string), an element address must hit.
fn bare_test(ctx: &Ctx<'_, '_>, step: &Step, node: NodeId, depth: usize) -> bool {
    match step.kind {
        StepKind::Variable => ctx.vars.contains_key(&step.match_name),
        StepKind::Count => !explore::find_step_matches(ctx.tree, node, depth, step).is_empty(),
        _ => !value::step_values(ctx, step, node, depth, 1).is_empty(),
    }
}

fn lhs_values(ctx: &Ctx<'_, '_>, step: &Step, node: NodeId, depth: usize) -> Vec<Resolved> {
    value::step_values(ctx, step, node, depth, 1)
}

/// Resolve a comparator operand to a single string (first hit wins for
/// element references).
fn rhs_value(ctx: &Ctx<'_, '_>, step: &Step, node: NodeId, depth: usize) -> Option<String> {
    if step.kind == StepKind::Literal {
        return Some(step.raw.clone());
    }
    value::step_values(ctx, step, node, depth, 1)
        .into_iter()
        .next()
        .map(|r| r.value)
}

fn compare(
    ctx: &Ctx<'_, '_>,
    step: &Step,
    comparator: &Comparator,
    node: NodeId,
    depth: usize,
) -> bool {
    let Some(rhs) = rhs_value(ctx, &comparator.rhs, node, depth) else {
        return false;
    };
    let lhs = lhs_values(ctx, step, node, depth);
    if lhs.is_empty() {
        return false;
    }
    if comparator.kind.is_numeric() {
        let Ok(right) = rhs.trim().parse::<i64>() else {
            return false;
        };
        lhs.iter().any(|l| {
            l.value
                .trim()
                .parse::<i64>()
                .map(|left| numeric_holds(comparator.kind, left, right))
                .unwrap_or(false)
        })
    } else {
        let right = rhs.to_ascii_uppercase();
        lhs.iter().any(|l| {
            let left = l.value.to_ascii_uppercase();
            string_holds(comparator.kind, &left, &right)
        })
    }
}

fn numeric_holds(kind: CompKind, left: i64, right: i64) -> bool {
    match kind {
        CompKind::Gt => left > right,
        CompKind::Ge => left >= right,
        CompKind::Lt => left < right,
        CompKind::Le => left <= right,
        CompKind::Eq => left == right,
        CompKind::Ne => left != right,
        _ => false,
    }
}

fn string_holds(kind: CompKind, left: &str, right: &str) -> bool {
    match kind {
        CompKind::Equals => left == right,
        CompKind::Contains => left.contains(right),
        CompKind::StartsWith => left.starts_with(right),
        CompKind::EndsWith => left.ends_with(right),
        CompKind::IsNot => left != right,
        _ => false,
    }
}
