//! Compiled state graph: immutable, supports invoke and resume from a node.
//!
//! Built by `StateGraph::compile`. Runs from the first node (or a chosen node), follows
//! edges, conditional routers, and node-requested jumps until END.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::error::SdnaError;

use super::conditional::NextEntry;
use super::logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
    log_node_state,
};
use super::node::Node;
use super::{Next, END};

/// Node executions allowed per run before the graph is considered runaway.
pub const DEFAULT_RECURSION_LIMIT: usize = 1000;

/// Compiled graph: immutable structure, supports invoke.
///
/// Created by `StateGraph::compile()`. Holds nodes plus the resolved route after each node.
pub struct CompiledStateGraph<S> {
    pub(super) nodes: HashMap<String, Arc<dyn Node<S>>>,
    pub(super) first_node_id: String,
    /// Route after each node: fixed next node or conditional router. Absent means END.
    pub(super) next_map: HashMap<String, NextEntry<S>>,
    pub(super) recursion_limit: usize,
}

impl<S> CompiledStateGraph<S>
where
    S: Clone + Send + Sync + Debug + 'static,
{
    /// Id of the node connected to START.
    pub fn first_node_id(&self) -> &str {
        &self.first_node_id
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Node ids in sorted order.
    pub fn node_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.nodes.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Node executions allowed per run.
    pub fn recursion_limit(&self) -> usize {
        self.recursion_limit
    }

    /// Runs the graph from the first node with the given state and returns the final state.
    pub async fn invoke(&self, state: S) -> Result<S, SdnaError> {
        let first = self.first_node_id.clone();
        self.invoke_from(state, &first).await
    }

    /// Runs the graph starting at `node_id` instead of the first node.
    ///
    /// Used to resume a suspended run at the node after the one that suspended it.
    pub async fn invoke_from(&self, state: S, node_id: &str) -> Result<S, SdnaError> {
        self.invoke_from_partial(state, node_id)
            .await
            .map_err(|partial| partial.error)
    }

    /// Like [`invoke_from`](Self::invoke_from), but a failed run hands back the last state
    /// it reached. The state is absent only when a node itself returned the error.
    pub async fn invoke_from_partial(&self, state: S, node_id: &str) -> Result<S, PartialRun<S>> {
        if self.nodes.is_empty() {
            return Err(PartialRun::new(
                SdnaError::ExecutionFailed("empty graph".into()),
                Some(state),
            ));
        }
        log_graph_start(node_id);
        let mut state = state;
        let mut current = node_id.to_string();
        let mut steps = 0usize;

        loop {
            if steps >= self.recursion_limit {
                let err = SdnaError::ExecutionFailed(format!(
                    "recursion limit of {} steps reached at node '{}'",
                    self.recursion_limit, current
                ));
                log_graph_error(&err);
                return Err(PartialRun::new(err, Some(state)));
            }
            steps += 1;

            let node = match self.nodes.get(&current) {
                Some(node) => node,
                None => {
                    let err = SdnaError::ExecutionFailed(format!("node not found: {}", current));
                    log_graph_error(&err);
                    return Err(PartialRun::new(err, Some(state)));
                }
            };
            log_node_start(&current);
            log_node_state(&current, &state);

            let (new_state, next) = match node.run(state).await {
                Ok(result) => result,
                Err(e) => {
                    log_graph_error(&e);
                    return Err(PartialRun::new(e, None));
                }
            };
            log_node_complete(&current, &next);
            state = new_state;

            let next_id = match self.next_map.get(&current) {
                Some(NextEntry::Conditional(router)) => Some(router.resolve_next(&state)),
                entry => match next {
                    Next::End => None,
                    Next::Node(id) => Some(id),
                    Next::Continue => match entry {
                        Some(NextEntry::Unconditional(to)) => Some(to.clone()),
                        _ => None,
                    },
                },
            };

            match next_id {
                Some(id) if id != END => current = id,
                _ => {
                    log_graph_complete(steps);
                    return Ok(state);
                }
            }
        }
    }
}

/// A failed run: the error plus the state the run had reached, when it still had one.
#[derive(Debug)]
pub struct PartialRun<S> {
    pub error: SdnaError,
    pub state: Option<S>,
}

impl<S> PartialRun<S> {
    fn new(error: SdnaError, state: Option<S>) -> Self {
        Self { error, state }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{StateGraph, START};
    use async_trait::async_trait;

    /// Adds `delta` to the state; optionally jumps back while the state is below `jump_below`.
    struct AddNode {
        id: &'static str,
        delta: i32,
        jump: Option<(&'static str, i32)>,
    }

    #[async_trait]
    impl Node<i32> for AddNode {
        fn id(&self) -> &str {
            self.id
        }

        async fn run(&self, state: i32) -> Result<(i32, Next), SdnaError> {
            let state = state + self.delta;
            match self.jump {
                Some((target, below)) if state < below => Ok((state, Next::Node(target.into()))),
                _ => Ok((state, Next::Continue)),
            }
        }
    }

    fn add(id: &'static str, delta: i32) -> Arc<dyn Node<i32>> {
        Arc::new(AddNode { id, delta, jump: None })
    }

    #[tokio::test]
    async fn linear_chain_runs_in_order() {
        let mut g = StateGraph::<i32>::new();
        g.add_node("one", add("one", 1))
            .add_node("ten", add("ten", 10))
            .add_edge(START, "one")
            .add_edge("one", "ten")
            .add_edge("ten", END);
        let compiled = g.compile().unwrap();
        assert_eq!(compiled.invoke(0).await.unwrap(), 11);
        assert_eq!(compiled.invoke_from(0, "ten").await.unwrap(), 10);
    }

    /// **Scenario**: The router decides after a conditional node; the node's Next is ignored.
    #[tokio::test]
    async fn conditional_edges_route_on_state() {
        let mut g = StateGraph::<i32>::new();
        g.add_node("inc", add("inc", 1))
            .add_node("big", add("big", 100))
            .add_edge(START, "inc")
            .add_edge("big", END);
        g.add_conditional_edges(
            "inc",
            Arc::new(|s: &i32| if *s > 1 { "large".to_string() } else { "small".to_string() }),
            Some(
                [("large".to_string(), "big".to_string()), ("small".to_string(), END.to_string())]
                    .into_iter()
                    .collect(),
            ),
        );
        let compiled = g.compile().unwrap();
        assert_eq!(compiled.invoke(0).await.unwrap(), 1);
        assert_eq!(compiled.invoke(5).await.unwrap(), 106);
    }

    /// **Scenario**: A node jumping back loops until it stops, and runaway loops hit the limit.
    #[tokio::test]
    async fn jumps_loop_and_recursion_limit_stops_runaway() {
        let build = |below: i32, limit: usize| {
            let mut g = StateGraph::<i32>::new().with_recursion_limit(limit);
            g.add_node("head", add("head", 0))
                .add_node(
                    "body",
                    Arc::new(AddNode {
                        id: "body",
                        delta: 1,
                        jump: Some(("head", below)),
                    }),
                )
                .add_edge(START, "head")
                .add_edge("head", "body")
                .add_edge("body", END);
            g.compile().unwrap()
        };
        assert_eq!(build(3, 100).invoke(0).await.unwrap(), 3);
        let err = build(1000, 10).invoke(0).await.unwrap_err();
        assert!(err.to_string().contains("recursion limit"), "{}", err);
    }

    /// **Scenario**: A run stopped by the limit hands back the state it had reached.
    #[tokio::test]
    async fn partial_run_keeps_reached_state() {
        let mut g = StateGraph::<i32>::new().with_recursion_limit(4);
        g.add_node("head", add("head", 0))
            .add_node(
                "body",
                Arc::new(AddNode {
                    id: "body",
                    delta: 1,
                    jump: Some(("head", 1000)),
                }),
            )
            .add_edge(START, "head")
            .add_edge("head", "body")
            .add_edge("body", END);
        let compiled = g.compile().unwrap();
        assert_eq!(compiled.recursion_limit(), 4);
        let partial = compiled.invoke_from_partial(0, "head").await.unwrap_err();
        assert_eq!(partial.state, Some(2));
        assert!(partial.error.to_string().contains("at node 'head'"));
    }
}
