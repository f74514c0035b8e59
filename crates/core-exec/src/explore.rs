//! Tree exploration for visit paths and element addresses.

use core_parse::{NodeId, Tree};
use core_query::{Block, Step};

/// Name match with optional namespace wildcard: a leading `:` on the query
/// component accepts any prefix before the final colon.
fn name_matches(node_name: &str, want: &str, wild_ns: bool) -> bool {
    if want.is_empty() {
        return true;
    }
    if node_name == want {
        return true;
    }
    if wild_ns {
        if let Some((_, local)) = node_name.rsplit_once(':') {
            return local == want;
        }
    }
    false
}

fn node_matches(tree: &Tree<'_>, id: NodeId, parent: &str, parent_wild: bool, name: &str, wild: bool) -> bool {
    let node = tree.farm.get(id);
    name_matches(node.name, name, wild) && name_matches(node.parent_name, parent, parent_wild)
}

/// Matches for a block's visit path under `base`, in document order with
/// their depths. A matched subtree is not re-entered unless `deep`.
pub(crate) fn find_block_matches(
    tree: &Tree<'_>,
    base: NodeId,
    base_depth: usize,
    block: &Block,
) -> Vec<(NodeId, usize)> {
    let mut acc = Vec::new();
    walk(
        tree,
        base,
        base_depth,
        &mut |id| node_matches(tree, id, &block.parent, block.parent_wild_ns, &block.match_name, block.match_wild_ns),
        block.deep,
        &mut acc,
    );
    acc
}

/// Matches for one step address under `base`, including `base` itself.
pub(crate) fn find_step_matches(
    tree: &Tree<'_>,
    base: NodeId,
    base_depth: usize,
    step: &Step,
) -> Vec<(NodeId, usize)> {
    let mut acc = Vec::new();
    let matcher = |id: NodeId| {
        node_matches(tree, id, &step.parent, step.parent_wild_ns, &step.match_name, step.match_wild_ns)
    };
    if matcher(base) {
        acc.push((base, base_depth));
    }
    walk(tree, base, base_depth, &mut |id| matcher(id), false, &mut acc);
    acc
}

fn walk(
    tree: &Tree<'_>,
    id: NodeId,
    depth: usize,
    matcher: &mut dyn Fn(NodeId) -> bool,
    deep: bool,
    acc: &mut Vec<(NodeId, usize)>,
) {
    for child in tree.farm.children(id) {
        if matcher(child) {
            acc.push((child, depth + 1));
            if deep {
                walk(tree, child, depth + 1, matcher, deep, acc);
            }
        } else {
            walk(tree, child, depth + 1, matcher, deep, acc);
        }
    }
}
