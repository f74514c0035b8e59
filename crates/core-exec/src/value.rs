//! Step and clause evaluation: turning parsed addresses into value lists
//! against the current node.

use crate::explore;
use crate::Ctx;
use core_parse::{NodeId, Tree};
use core_query::{Clause, Step, StepKind};

/// One resolved value with the depth of the node that produced it.
#[derive(Debug, Clone)]
pub(crate) struct Resolved {
    pub value: String,
    pub depth: usize,
}

/// Evaluate one comma-clause: every member step's resolutions in order.
pub(crate) fn clause_resolved(
    ctx: &Ctx<'_, '_>,
    clause: &Clause,
    node: NodeId,
    depth: usize,
    ordinal: u64,
) -> Vec<Resolved> {
    clause
        .steps
        .iter()
        .flat_map(|step| step_values(ctx, step, node, depth, ordinal))
        .collect()
}

/// Evaluate one comma-clause down to plain values.
pub(crate) fn clause_values(
    ctx: &Ctx<'_, '_>,
    clause: &Clause,
    node: NodeId,
    depth: usize,
    ordinal: u64,
) -> Vec<String> {
    clause_resolved(ctx, clause, node, depth, ordinal)
        .into_iter()
        .map(|r| r.value)
        .collect()
}

/// Evaluate one step.
pub(crate) fn step_values(
    ctx: &Ctx<'_, '_>,
    step: &Step,
    node: NodeId,
    depth: usize,
    _ordinal: u64,
) -> Vec<Resolved> {
    match step.kind {
        StepKind::Variable => ctx
            .vars
            .get(&step.match_name)
            .map(|v| {
                vec![Resolved {
                    value: v.clone(),
                    depth,
                }]
            })
            .unwrap_or_default(),
        StepKind::Literal => vec![Resolved {
            value: step.raw.clone(),
            depth,
        }],
        StepKind::Element => element_values(ctx.tree, step, node, depth),
        StepKind::Count => {
            let n = explore::find_step_matches(ctx.tree, node, depth, step).len();
            vec![Resolved {
                value: n.to_string(),
                depth,
            }]
        }
        StepKind::Length => {
            let total: usize = element_values(ctx.tree, step, node, depth)
                .iter()
                .map(|r| r.value.chars().count())
                .sum();
            vec![Resolved {
                value: total.to_string(),
                depth,
            }]
        }
        StepKind::Depth => {
            let matches = explore::find_step_matches(ctx.tree, node, depth, step);
            matches
                .last()
                .map(|(_, d)| {
                    vec![Resolved {
                        value: d.to_string(),
                        depth: *d,
                    }]
                })
                .unwrap_or_default()
        }
        StepKind::Star => {
            let style = StarStyle::from_run(&step.match_name);
            let with_attrs = step.attribute.is_empty();
            vec![Resolved {
                value: print_subtree(ctx.tree, node, style, with_attrs),
                depth,
            }]
        }
        StepKind::Dollar => ctx
            .tree
            .farm
            .children(node)
            .map(|child| Resolved {
                value: ctx.tree.farm.get(child).name.to_string(),
                depth: depth + 1,
            })
            .collect(),
        StepKind::AtSign => ctx
            .tree
            .farm
            .get(node)
            .attributes()
            .iter()
            .map(|(name, _)| Resolved {
                value: name.to_string(),
                depth,
            })
            .collect(),
    }
}

/// Element content (or attribute value) for every node the address hits.
/// Containers with no direct text yield nothing.
fn element_values(tree: &Tree<'_>, step: &Step, node: NodeId, depth: usize) -> Vec<Resolved> {
    let hits = if step.match_name.is_empty() && step.parent.is_empty() {
        // Bare "@attr" addresses the current node.
        vec![(node, depth)]
    } else {
        explore::find_step_matches(tree, node, depth, step)
    };
    let mut out = Vec::new();
    for (id, d) in hits {
        let n = tree.farm.get(id);
        if step.attribute.is_empty() {
            if !n.content.is_empty() {
                out.push(Resolved {
                    value: n.content.to_string(),
                    depth: d,
                });
            }
        } else if let Some(v) = n.attribute(&step.attribute) {
            out.push(Resolved {
                value: v.to_string(),
                depth: d,
            });
        }
    }
    out
}

/// `*` print styles; each extra star moves one entry down the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StarStyle {
    Compact,
    Flush,
    Indent,
    Subtree,
    Wrapped,
}

impl StarStyle {
    fn from_run(stars: &str) -> Self {
        match stars.len() {
            0 | 1 => Self::Compact,
            2 => Self::Flush,
            3 => Self::Indent,
            4 => Self::Subtree,
            _ => Self::Wrapped,
        }
    }
}

/// Render the node's whole subtree as XML text.
pub(crate) fn print_subtree(
    tree: &Tree<'_>,
    node: NodeId,
    style: StarStyle,
    with_attrs: bool,
) -> String {
    let mut out = String::new();
    render(tree, node, style, with_attrs, 0, &mut out);
    // One-line styles build with separators already in place; line styles
    // end with a dangling newline to drop.
    if out.ends_with('\n') {
        out.pop();
    }
    out
}

fn render(
    tree: &Tree<'_>,
    id: NodeId,
    style: StarStyle,
    with_attrs: bool,
    level: usize,
    out: &mut String,
) {
    let node = tree.farm.get(id);
    let (indent, eol): (String, &str) = match style {
        StarStyle::Compact => (String::new(), ""),
        StarStyle::Flush => (String::new(), "\n"),
        StarStyle::Indent | StarStyle::Subtree | StarStyle::Wrapped => {
            ("  ".repeat(level), "\n")
        }
    };

    out.push_str(&indent);
    out.push('<');
    out.push_str(node.name);
    if with_attrs && !node.attrs_raw.is_empty() {
        match style {
            StarStyle::Wrapped => {
                for (name, value) in node.attributes() {
                    out.push('\n');
                    out.push_str(&indent);
                    out.push_str("  ");
                    out.push_str(&format!("{name}=\"{value}\""));
                }
                out.push('\n');
                out.push_str(&indent);
            }
            _ => {
                out.push(' ');
                out.push_str(node.attrs_raw);
            }
        }
    }
    out.push('>');

    let has_children = node.first_child.is_some();
    if !has_children {
        out.push_str(&node.content);
        out.push_str(&format!("</{}>", node.name));
        out.push_str(eol);
        return;
    }
    out.push_str(eol);
    if !node.content.is_empty() {
        match style {
            StarStyle::Compact => out.push_str(&node.content),
            _ => {
                out.push_str(&indent);
                out.push_str("  ");
                out.push_str(&node.content);
                out.push_str(eol);
            }
        }
    }
    for child in tree.farm.children(id) {
        render(tree, child, style, with_attrs, level + 1, out);
    }
    out.push_str(&indent);
    out.push_str(&format!("</{}>", node.name));
    out.push_str(eol);
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_parse::{BuildOptions, build_tree};
    use std::collections::HashMap;

    fn ctx<'a, 't>(tree: &'a core_parse::Tree<'t>) -> Ctx<'a, 't> {
        Ctx {
            tree,
            vars: HashMap::new(),
            out: String::new(),
            pending: String::new(),
        }
    }

    #[test]
    fn element_steps_resolve_content_and_attributes() {
        let tree = build_tree(
            "<R><E id=\"7\">body</E><C><E id=\"8\">x</E></C></R>",
            &BuildOptions::default(),
            16,
        )
        .unwrap();
        let c = ctx(&tree);
        let step = core_query::Step::parse("E").unwrap();
        let values = clause_values(&c, &core_query::Clause { steps: vec![step] }, tree.root, 1, 1);
        assert_eq!(values, vec!["body".to_string(), "x".to_string()]);

        let step = core_query::Step::parse("E@id").unwrap();
        let values = clause_values(&c, &core_query::Clause { steps: vec![step] }, tree.root, 1, 1);
        assert_eq!(values, vec!["7".to_string(), "8".to_string()]);
    }

    #[test]
    fn count_and_length_derivations() {
        let tree = build_tree("<R><E>ab</E><E>cde</E></R>", &BuildOptions::default(), 8).unwrap();
        let c = ctx(&tree);
        let count = core_query::Step::parse("#E").unwrap();
        assert_eq!(
            step_values(&c, &count, tree.root, 1, 1)[0].value,
            "2"
        );
        let length = core_query::Step::parse("%E").unwrap();
        assert_eq!(
            step_values(&c, &length, tree.root, 1, 1)[0].value,
            "5"
        );
    }

    #[test]
    fn dollar_and_atsign_list_names() {
        let tree = build_tree(
            "<R a=\"1\" b=\"2\"><X>1</X><Y>2</Y></R>",
            &BuildOptions::default(),
            8,
        )
        .unwrap();
        let c = ctx(&tree);
        let dollar = core_query::Step::parse("$").unwrap();
        let names: Vec<String> = step_values(&c, &dollar, tree.root, 1, 1)
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(names, vec!["X", "Y"]);
        let at = core_query::Step::parse("@").unwrap();
        let attrs: Vec<String> = step_values(&c, &at, tree.root, 1, 1)
            .into_iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(attrs, vec!["a", "b"]);
    }

    #[test]
    fn star_prints_subtree_compact() {
        let tree = build_tree(
            "<R><A x=\"1\">v</A><B>w</B></R>",
            &BuildOptions::default(),
            8,
        )
        .unwrap();
        let got = print_subtree(&tree, tree.root, StarStyle::Compact, true);
        assert_eq!(got, "<R><A x=\"1\">v</A><B>w</B></R>");
        let bare = print_subtree(&tree, tree.root, StarStyle::Compact, false);
        assert_eq!(bare, "<R><A>v</A><B>w</B></R>");
    }
}
