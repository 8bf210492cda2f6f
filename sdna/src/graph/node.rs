//! Graph node trait: one step in a StateGraph.
//!
//! Receives state `S`, returns updated `S` and `Next` (continue, jump, or end).

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::SdnaError;

use super::Next;

/// One step in a graph: state in, (state out, next step).
///
/// **Interaction**: Registered with `StateGraph::add_node`; run by `CompiledStateGraph::invoke`.
#[async_trait]
pub trait Node<S>: Send + Sync
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Node id. Must be unique within a graph.
    fn id(&self) -> &str;

    /// Return `Next::Continue` to follow the outgoing edge, `Next::Node(id)` to jump,
    /// `Next::End` to stop.
    async fn run(&self, state: S) -> Result<(S, Next), SdnaError>;
}
