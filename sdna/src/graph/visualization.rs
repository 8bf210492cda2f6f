//! Graph visualization: Graphviz DOT and plain-text summaries of a compiled graph.

use std::fmt::Debug;

use super::conditional::NextEntry;
use super::CompiledStateGraph;
use super::{END, START};

fn label(id: &str) -> &str {
    match id {
        START => "START",
        END => "END",
        other => other,
    }
}

/// Generate Graphviz DOT format representation of the graph.
///
/// Conditional routes are drawn dashed and labelled with their routing key.
pub fn generate_dot<S>(graph: &CompiledStateGraph<S>) -> String
where
    S: Clone + Send + Sync + Debug + 'static,
{
    let mut dot = String::from("digraph {\n");
    dot.push_str("  rankdir=LR;\n");
    dot.push_str("  node [shape=box];\n\n");
    dot.push_str(&format!(
        "  \"{}\" [label=\"START\", style=bold, fillcolor=lightgreen];\n",
        START
    ));
    dot.push_str(&format!(
        "  \"{}\" [label=\"END\", style=bold, fillcolor=lightcoral];\n",
        END
    ));
    for id in graph.node_ids() {
        dot.push_str(&format!("  \"{}\";\n", id));
    }
    dot.push('\n');

    dot.push_str(&format!("  \"{}\" -> \"{}\";\n", START, graph.first_node_id));
    for id in graph.node_ids() {
        match graph.next_map.get(id) {
            Some(NextEntry::Unconditional(to)) => {
                dot.push_str(&format!("  \"{}\" -> \"{}\";\n", id, to));
            }
            Some(NextEntry::Conditional(router)) => {
                for (key, to) in router.targets() {
                    dot.push_str(&format!(
                        "  \"{}\" -> \"{}\" [label=\"{}\", style=dashed];\n",
                        id, to, key
                    ));
                }
            }
            None => {}
        }
    }
    dot.push_str("}\n");
    dot
}

/// Generate a plain-text summary: node count and one route line per node.
pub fn generate_text<S>(graph: &CompiledStateGraph<S>) -> String
where
    S: Clone + Send + Sync + Debug + 'static,
{
    let mut text = String::from("Graph Structure:\n");
    text.push_str(&format!("  Nodes: {}\n", graph.node_count()));
    text.push_str(&format!("  Entry: {}\n", graph.first_node_id));
    text.push_str("  Routes:\n");
    for id in graph.node_ids() {
        match graph.next_map.get(id) {
            Some(NextEntry::Unconditional(to)) => {
                text.push_str(&format!("    {} -> {}\n", id, label(to)));
            }
            Some(NextEntry::Conditional(router)) => {
                let targets: Vec<String> = router
                    .targets()
                    .into_iter()
                    .map(|(key, to)| format!("{}: {}", key, label(&to)))
                    .collect();
                text.push_str(&format!("    {} -> {{{}}}\n", id, targets.join(", ")));
            }
            None => text.push_str(&format!("    {} -> END\n", id)),
        }
    }
    text
}
