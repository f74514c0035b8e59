//! Block-tree execution against one record's node tree.
//!
//! The walk mirrors the compiled program: for every node matching a
//! block's visit path (and passing its conditions), the block's commands
//! run in order and its child blocks recurse with that node as their base.
//! Output accumulates into a per-record byte buffer; variables live in a
//! per-record map owned by the executing worker, so nothing here needs
//! synchronization.

mod cond;
mod explore;
mod stopwords;
mod transform;
mod value;

pub use stopwords::is_stop_word;

use core_parse::{NodeId, Tree};
use core_query::{Block, OpKind, Operation, Position};
use std::collections::HashMap;

/// Sticky separators and wrap state, reset per block entry except for the
/// tab/ret pair, which child blocks inherit from their parent.
#[derive(Debug, Clone)]
struct Frame {
    tab: String,
    ret: String,
    pfx: String,
    sfx: String,
    sep: String,
    def: String,
}

impl Frame {
    fn child_of(parent: &Frame) -> Self {
        Self {
            tab: parent.tab.clone(),
            ret: parent.ret.clone(),
            pfx: String::new(),
            sfx: String::new(),
            sep: "\t".to_string(),
            def: String::new(),
        }
    }

    fn root() -> Self {
        Self {
            tab: "\t".to_string(),
            ret: "\n".to_string(),
            pfx: String::new(),
            sfx: String::new(),
            sep: "\t".to_string(),
            def: String::new(),
        }
    }
}

/// Per-record execution state shared across the whole block walk.
struct Ctx<'a, 't> {
    tree: &'a Tree<'t>,
    vars: HashMap<String, String>,
    out: String,
    /// Separator owed before the next emitted item ("" at row start).
    pending: String,
}

impl<'a, 't> Ctx<'a, 't> {
    /// Write one composed item: owed separator, prefix, body, suffix.
    fn emit(&mut self, frame: &Frame, body: &str) {
        self.out.push_str(&self.pending);
        self.out.push_str(&frame.pfx);
        self.out.push_str(body);
        self.out.push_str(&frame.sfx);
        self.pending = frame.tab.clone();
    }
}

/// Execute the compiled program against one record tree. Returns the
/// record's formatted output (empty when the pattern does not apply).
pub fn execute(program: &Block, tree: &Tree<'_>) -> String {
    let root_name = tree.root_node().name;
    if !program.match_name.is_empty() && program.match_name != root_name {
        return String::new();
    }
    let mut ctx = Ctx {
        tree,
        vars: HashMap::new(),
        out: String::new(),
        pending: String::new(),
    };
    let mut frame = Frame::root();
    let ret = frame.ret.clone();

    if cond::conditions_pass(&mut ctx, program, tree.root, 1) {
        run_commands(&mut ctx, program, &mut frame, tree.root, 1, 1);
        descend(&mut ctx, program, &frame, tree.root, 1);
    } else {
        run_failure(&mut ctx, program, &frame, tree.root);
    }

    if ctx.out.is_empty() {
        return String::new();
    }
    ctx.out.push_str(&ret);
    ctx.out
}

fn descend(ctx: &mut Ctx<'_, '_>, block: &Block, frame: &Frame, node: NodeId, depth: usize) {
    for child in &block.children {
        exec_block(ctx, child, frame, node, depth);
    }
}

fn exec_block(ctx: &mut Ctx<'_, '_>, block: &Block, parent_frame: &Frame, base: NodeId, base_depth: usize) {
    let mut frame = Frame::child_of(parent_frame);
    let mut matches = explore::find_block_matches(ctx.tree, base, base_depth, block);
    apply_position(&mut matches, block.position);

    let mut ran = false;
    for (ordinal, (node, depth)) in matches.iter().enumerate() {
        if !cond::conditions_pass(ctx, block, *node, *depth) {
            continue;
        }
        ran = true;
        run_commands(ctx, block, &mut frame, *node, *depth, ordinal as u64 + 1);
        descend(ctx, block, &frame, *node, *depth);
    }
    if !ran {
        run_failure(ctx, block, &frame, base);
    }
}

fn apply_position(matches: &mut Vec<(NodeId, usize)>, position: Option<Position>) {
    let Some(position) = position else { return };
    match position {
        Position::First => matches.truncate(1),
        Position::Last => {
            if matches.len() > 1 {
                let last = matches.pop();
                matches.clear();
                matches.extend(last);
            }
        }
        Position::Nth(n) => {
            if n >= 1 && n <= matches.len() {
                let kept = matches[n - 1];
                matches.clear();
                matches.push(kept);
            } else {
                matches.clear();
            }
        }
    }
}

// Frame mutation needs &mut, the read paths need &; two entry points keep
// the borrows honest.
fn run_commands(
    ctx: &mut Ctx<'_, '_>,
    block: &Block,
    frame: &mut Frame,
    node: NodeId,
    depth: usize,
    ordinal: u64,
) {
    for op in &block.commands {
        apply_operation(ctx, frame, op, node, depth, ordinal);
    }
}

fn run_failure(ctx: &mut Ctx<'_, '_>, block: &Block, frame: &Frame, node: NodeId) {
    let mut frame = frame.clone();
    for op in &block.failure {
        apply_operation(ctx, &mut frame, op, node, 1, 1);
    }
}

fn apply_operation(
    ctx: &mut Ctx<'_, '_>,
    frame: &mut Frame,
    op: &Operation,
    node: NodeId,
    depth: usize,
    ordinal: u64,
) {
    match op.kind {
        OpKind::Pfx => frame.pfx = op.value.clone(),
        OpKind::Sfx => frame.sfx = op.value.clone(),
        OpKind::Sep => frame.sep = op.value.clone(),
        OpKind::Tab => frame.tab = op.value.clone(),
        OpKind::Ret => frame.ret = op.value.clone(),
        OpKind::Def => frame.def = op.value.clone(),
        OpKind::Clr => ctx.pending.clear(),
        OpKind::Pfc => {
            ctx.pending.clear();
            frame.pfx = op.value.clone();
        }
        OpKind::Rst => {
            frame.pfx.clear();
            frame.sfx.clear();
            frame.sep = "\t".to_string();
        }
        OpKind::Lbl => {
            let label = op.value.clone();
            ctx.emit(frame, &label);
        }
        OpKind::Variable => {
            let values: Vec<String> = op
                .clauses
                .iter()
                .flat_map(|clause| value::clause_values(ctx, clause, node, depth, ordinal))
                .collect();
            if op.clauses.is_empty() {
                // `-NAME ""` unsets.
                ctx.vars.remove(&op.value);
            } else if values.is_empty() {
                ctx.vars.remove(&op.value);
            } else {
                ctx.vars.insert(op.value.clone(), values.join(&frame.sep));
            }
        }
        _ => emit_extraction(ctx, frame, op, node, depth, ordinal),
    }
}

/// Value-producing ops: per clause argument, collect raw values, run the
/// op's transform, and compose prefix/separator/suffix state. The first
/// clause with values takes the prefix; later clauses are tab-joined; the
/// suffix closes the whole emission.
fn emit_extraction(
    ctx: &mut Ctx<'_, '_>,
    frame: &Frame,
    op: &Operation,
    node: NodeId,
    depth: usize,
    ordinal: u64,
) {
    let mut wrote_any = false;
    for clause in &op.clauses {
        let resolved = value::clause_resolved(ctx, clause, node, depth, ordinal);
        let raw: Vec<String> = if op.kind == OpKind::Depth {
            resolved.iter().map(|r| r.depth.to_string()).collect()
        } else {
            resolved.into_iter().map(|r| r.value).collect()
        };
        let mut values = transform::apply(op.kind, raw, ordinal);
        if values.is_empty() && !frame.def.is_empty() {
            values = vec![frame.def.clone()];
        }
        if values.is_empty() {
            continue;
        }
        let body = values.join(&frame.sep);
        if wrote_any {
            ctx.out.push_str(&frame.tab);
            ctx.out.push_str(&body);
        } else {
            ctx.out.push_str(&ctx.pending.clone());
            ctx.out.push_str(&frame.pfx);
            ctx.out.push_str(&body);
            wrote_any = true;
        }
    }
    if wrote_any {
        ctx.out.push_str(&frame.sfx);
        ctx.pending = frame.tab.clone();
    }
}
