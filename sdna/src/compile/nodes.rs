//! Graph nodes for the workflow layers.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::ariadne::AriadneChain;
use crate::error::SdnaError;
use crate::graph::{CompiledStateGraph, Next, Node};
use crate::runtime::Runtime;
use crate::sdnac::Sdnac;

use super::{invoke_keeping_state, SdnaState};

/// Applies one element of a thread.
pub struct ElementNode {
    id: String,
    chain: Arc<AriadneChain>,
    index: usize,
    runtime: Runtime,
}

impl ElementNode {
    pub fn new(id: impl Into<String>, chain: Arc<AriadneChain>, index: usize, runtime: Runtime) -> Self {
        Self {
            id: id.into(),
            chain,
            index,
            runtime,
        }
    }
}

#[async_trait]
impl Node<SdnaState> for ElementNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, mut state: SdnaState) -> Result<(SdnaState, Next), SdnaError> {
        let element = self.chain.elements.get(self.index).ok_or_else(|| {
            SdnaError::ExecutionFailed(format!(
                "thread '{}' has no element {}",
                self.chain.name, self.index
            ))
        })?;
        let context = std::mem::take(&mut state.context);
        match self.chain.step(self.index, element, context, &self.runtime).await {
            Ok(context) => state.context = context,
            Err(halted) => state.apply(halted),
        }
        Ok((state, Next::Continue))
    }
}

/// The generation step of a unit.
pub struct GenerationNode {
    id: String,
    unit: Arc<Sdnac>,
    runtime: Runtime,
}

impl GenerationNode {
    pub fn new(id: impl Into<String>, unit: Arc<Sdnac>, runtime: Runtime) -> Self {
        Self {
            id: id.into(),
            unit,
            runtime,
        }
    }
}

#[async_trait]
impl Node<SdnaState> for GenerationNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, mut state: SdnaState) -> Result<(SdnaState, Next), SdnaError> {
        let context = std::mem::take(&mut state.context);
        let outcome = self.unit.generate(context, &self.runtime).await;
        state.apply(outcome);
        Ok((state, Next::Continue))
    }
}

/// A compiled graph embedded as one node.
///
/// The inner run starts with a running status; its final state replaces the outer one.
pub struct SubgraphNode {
    pub(super) id: String,
    graph: Arc<CompiledStateGraph<SdnaState>>,
    entry: Option<String>,
}

impl SubgraphNode {
    pub fn new(id: impl Into<String>, graph: CompiledStateGraph<SdnaState>) -> Self {
        Self {
            id: id.into(),
            graph: Arc::new(graph),
            entry: None,
        }
    }

    /// Enters the inner graph at `node` instead of its first node.
    pub fn with_entry(mut self, node: impl Into<String>) -> Self {
        self.entry = Some(node.into());
        self
    }

    /// Runs the inner graph from its entry. Engine failures come back as an error state.
    pub(crate) async fn run_inner(&self, state: SdnaState) -> SdnaState {
        let entry = self
            .entry
            .clone()
            .unwrap_or_else(|| self.graph.first_node_id().to_string());
        self.run_inner_from(state, &entry).await
    }

    pub(crate) async fn run_inner_from(&self, mut state: SdnaState, node: &str) -> SdnaState {
        debug!(node_id = %self.id, entry = node, "enter subgraph");
        state.status = Default::default();
        invoke_keeping_state(&self.graph, state, node).await
    }
}

#[async_trait]
impl Node<SdnaState> for SubgraphNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(&self, state: SdnaState) -> Result<(SdnaState, Next), SdnaError> {
        Ok((self.run_inner(state).await, Next::Continue))
    }
}

/// One unit of a flow; records its index as the resume path when it halts.
pub struct FlowUnitNode {
    index: usize,
    inner: SubgraphNode,
}

impl FlowUnitNode {
    pub fn new(id: impl Into<String>, index: usize, graph: CompiledStateGraph<SdnaState>) -> Self {
        Self {
            index,
            inner: SubgraphNode::new(id, graph),
        }
    }

    /// Enters the unit's graph at `node`; used when resuming the unit that halted the flow.
    pub fn with_entry(mut self, node: impl Into<String>) -> Self {
        self.inner = self.inner.with_entry(node);
        self
    }
}

#[async_trait]
impl Node<SdnaState> for FlowUnitNode {
    fn id(&self) -> &str {
        self.inner.id.as_str()
    }

    async fn run(&self, state: SdnaState) -> Result<(SdnaState, Next), SdnaError> {
        let mut state = self.inner.run_inner(state).await;
        if !state.is_running() {
            state.resume_path = Some(vec![self.index]);
        }
        Ok((state, Next::Continue))
    }
}
