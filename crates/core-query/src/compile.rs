//! Two-phase compilation of the argument vector.
//!
//! Phase A builds the exploration skeleton from nesting markers in
//! precedence order (`-pattern` outermost through `-unit`); each marker
//! owns the raw argument run up to the next marker at equal or outer
//! level. Phase B splits a run into leading conditionals, extraction and
//! customization commands, and an optional `-else` failure branch.

use crate::coords::{self, Flavor};
use crate::ops::{
    Block, Clause, CompKind, Comparator, CondKind, Condition, Level, OpKind, Operation, Position,
    Step, is_variable_name,
};
use crate::QueryError;

/// Compile the extraction argument vector. `args` must begin at the
/// `-pattern` marker; global options are stripped by the caller.
pub fn compile(args: &[String]) -> Result<Block, QueryError> {
    let first = args.first().ok_or(QueryError::MissingPattern)?;
    match Level::parse(first) {
        Some(Level::Pattern) => {}
        Some(_) => return Err(QueryError::EarlyExploration(first.clone())),
        None => return Err(QueryError::UnknownCommand(first.clone())),
    }
    let (block, consumed) = parse_exploration(args, 0)?;
    if consumed < args.len() {
        let extra = &args[consumed];
        if Level::parse(extra) == Some(Level::Pattern) {
            return Err(QueryError::DuplicatePattern);
        }
        return Err(QueryError::Misplaced(extra.clone()));
    }
    Ok(block)
}

fn parse_exploration(args: &[String], at: usize) -> Result<(Block, usize), QueryError> {
    let marker = &args[at];
    let level = Level::parse(marker).expect("caller checked the marker");
    let visit = args
        .get(at + 1)
        .filter(|v| !v.starts_with('-'))
        .ok_or_else(|| QueryError::MissingOperand(marker.clone()))?;
    let mut block = Block::new(level, visit);

    let mut idx = at + 2;
    let run_start = idx;
    // The raw run ends at the first nested marker; equal or outer markers
    // end the block itself.
    while idx < args.len() && Level::parse(&args[idx]).is_none() {
        idx += 1;
    }
    parse_run(&mut block, &args[run_start..idx])?;

    while idx < args.len() {
        match Level::parse(&args[idx]) {
            Some(l) if l > level => {}
            _ => break,
        }
        let (child, next) = parse_exploration(args, idx)?;
        block.children.push(child);
        idx = next;
    }
    Ok((block, idx))
}

fn is_condition_flag(arg: &str) -> bool {
    CondKind::parse(arg).is_some() || arg.eq_ignore_ascii_case("-position")
}

/// Phase B: conditions, then commands, then an optional `-else` branch.
fn parse_run(block: &mut Block, run: &[String]) -> Result<(), QueryError> {
    let mut idx = 0;

    while idx < run.len() && is_condition_flag(&run[idx]) {
        let flag = &run[idx];
        if flag.eq_ignore_ascii_case("-position") {
            let value = run
                .get(idx + 1)
                .ok_or_else(|| QueryError::MissingOperand(flag.clone()))?;
            block.position = Some(Position::parse(value)?);
            idx += 2;
            continue;
        }
        let kind = CondKind::parse(flag).expect("checked by is_condition_flag");
        let operand = run
            .get(idx + 1)
            .filter(|v| !v.starts_with('-') || v.len() == 1)
            .ok_or_else(|| QueryError::MissingOperand(flag.clone()))?;
        let step = Step::parse(operand)?;
        idx += 2;
        let comparator = match run.get(idx).and_then(|f| CompKind::parse(f)) {
            Some(comp) => {
                let comp_flag = &run[idx];
                let rhs_raw = run
                    .get(idx + 1)
                    .ok_or_else(|| QueryError::DanglingComparator(comp_flag.clone()))?;
                idx += 2;
                let rhs = parse_rhs(rhs_raw);
                Some(Comparator { kind: comp, rhs })
            }
            None => None,
        };
        block.conditions.push(Condition {
            kind,
            step,
            comparator,
        });
    }

    if block.position.is_some() && !block.conditions.is_empty() {
        return Err(QueryError::PositionWithCondition);
    }

    let mut in_failure = false;
    while idx < run.len() {
        let flag = &run[idx];
        if flag.eq_ignore_ascii_case("-else") {
            if in_failure {
                return Err(QueryError::Misplaced(flag.clone()));
            }
            in_failure = true;
            idx += 1;
            continue;
        }
        if is_condition_flag(flag) {
            return Err(QueryError::Misplaced(flag.clone()));
        }
        let (op_list, next) = parse_command(run, idx)?;
        if in_failure {
            block.failure.extend(op_list);
        } else {
            block.commands.extend(op_list);
        }
        idx = next;
    }
    Ok(())
}

/// A comparator right-hand side: tokens marked with `#`, `%`, `^`, `&`, or
/// `@` are element/variable references; everything else is a literal.
fn parse_rhs(raw: &str) -> Step {
    if raw.starts_with(['#', '%', '^', '&', '@']) && raw.len() > 1 {
        if let Ok(step) = Step::parse(raw) {
            return step;
        }
    }
    Step::literal(raw)
}

/// Parse one command flag and its operands starting at `run[idx]`.
fn parse_command(run: &[String], idx: usize) -> Result<(Vec<Operation>, usize), QueryError> {
    let flag = &run[idx];
    if !flag.starts_with('-') {
        return Err(QueryError::Misplaced(flag.clone()));
    }

    if let Some(kind) = OpKind::parse_customization(flag) {
        if kind.is_bare() {
            return Ok((vec![Operation::bare(kind)], idx + 1));
        }
        let value = run
            .get(idx + 1)
            .ok_or_else(|| QueryError::MissingOperand(flag.clone()))?;
        return Ok((
            vec![Operation::with_value(kind, &unescape(value))],
            idx + 2,
        ));
    }

    if let Some(kind) = OpKind::parse_extraction(flag) {
        let (clauses, next) = collect_clauses(run, idx + 1)?;
        if clauses.is_empty() {
            return Err(QueryError::MissingOperand(flag.clone()));
        }
        return Ok((
            vec![Operation {
                kind,
                value: String::new(),
                clauses,
            }],
            next,
        ));
    }

    if let Some(flavor) = Flavor::parse(flag) {
        // Each selector may rewrite differently (start vs stop), so every
        // operand becomes its own operation.
        let (clauses, next) = collect_clauses(run, idx + 1)?;
        if clauses.is_empty() {
            return Err(QueryError::MissingOperand(flag.clone()));
        }
        let mut ops = Vec::with_capacity(clauses.len());
        for clause in clauses {
            let selector = selector_name(&clause);
            let kind = coords::rewrite(&selector, flavor)
                .ok_or_else(|| QueryError::UnknownCoordinate(selector.clone()))?;
            ops.push(Operation {
                kind,
                value: String::new(),
                clauses: vec![clause],
            });
        }
        return Ok((ops, next));
    }

    if let Some(name) = flag.strip_prefix('-') {
        if is_variable_name(name) {
            let value = run
                .get(idx + 1)
                .ok_or_else(|| QueryError::MissingOperand(flag.clone()))?;
            // "(text)" assigns the parenthesized literal (so "()" assigns
            // the empty string); "" unsets; anything else is a clause to
            // evaluate.
            let clauses = if value.is_empty() {
                Vec::new()
            } else if let Some(literal) = value
                .strip_prefix('(')
                .and_then(|v| v.strip_suffix(')'))
            {
                vec![Clause {
                    steps: vec![Step::literal(literal)],
                }]
            } else {
                vec![Clause::parse(value)?]
            };
            return Ok((
                vec![Operation {
                    kind: OpKind::Variable,
                    value: name.to_string(),
                    clauses,
                }],
                idx + 2,
            ));
        }
    }

    Err(QueryError::UnknownCommand(flag.clone()))
}

fn selector_name(clause: &Clause) -> String {
    match clause.steps.first() {
        Some(step) if !step.attribute.is_empty() && step.match_name.is_empty() => {
            format!("@{}", step.attribute)
        }
        Some(step) => step.match_name.clone(),
        None => String::new(),
    }
}

fn collect_clauses(run: &[String], mut idx: usize) -> Result<(Vec<Clause>, usize), QueryError> {
    let mut clauses = Vec::new();
    while idx < run.len() {
        let arg = &run[idx];
        // A lone "-" or an address beginning with '-' never occurs; any
        // dash-led token is the next command.
        if arg.starts_with('-') && arg.len() > 1 {
            break;
        }
        clauses.push(Clause::parse(arg)?);
        idx += 1;
    }
    Ok((clauses, idx))
}

/// The shell delivers `\n` and `\t` escapes literally; the original tool
/// interprets them in literal operands.
fn unescape(value: &str) -> String {
    if !value.contains('\\') {
        return value.to_string();
    }
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
