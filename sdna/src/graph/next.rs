//! Next-step result from a graph node: continue linear chain, jump to a node, or end.

/// Next step after running a node.
///
/// - **Continue**: follow the node's outgoing edge (or the linear order when it has none).
/// - **Node(id)**: jump to the given node (e.g. a rejected gate back to the loop head).
/// - **End**: stop; return current state as final result.
///
/// **Interaction**: Returned by `Node::run`; consumed by `CompiledStateGraph::invoke`.
/// Ignored after nodes with conditional edges, whose router decides instead.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum Next {
    Continue,
    Node(String),
    End,
}
