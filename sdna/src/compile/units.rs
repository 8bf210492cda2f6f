//! `to_graph` for threads, units, and flows.

use std::sync::Arc;

use tracing::info;

use crate::ariadne::AriadneChain;
use crate::context::Context;
use crate::graph::{CompilationError, CompiledStateGraph, NameNode, Node, StateGraph, END, START};
use crate::outcome::Outcome;
use crate::runtime::Runtime;
use crate::sdnac::{FlowOutcome, SdnaFlow, Sdnac};

use super::nodes::{ElementNode, FlowUnitNode, GenerationNode, SubgraphNode};
use super::{continue_or_stop, run_graph, status_router, step_limit, SdnaState};

const ARIADNE_NODE: &str = "ariadne";
const POIMANDRES_NODE: &str = "poimandres";

/// Chains `nodes` from START: each node continues to the next while running and
/// stops otherwise; the last node goes to END. An empty list gets one pass-through node.
fn chain_graph(
    nodes: Vec<(String, Arc<dyn Node<SdnaState>>)>,
    empty_id: String,
) -> Result<CompiledStateGraph<SdnaState>, CompilationError> {
    let mut graph = StateGraph::<SdnaState>::new().with_recursion_limit(step_limit(nodes.len()));
    if nodes.is_empty() {
        graph
            .add_node(empty_id.clone(), Arc::new(NameNode::new(empty_id.clone())))
            .add_edge(START, empty_id.clone())
            .add_edge(empty_id, END);
        return graph.compile();
    }

    let ids: Vec<String> = nodes.iter().map(|(id, _)| id.clone()).collect();
    for (id, node) in nodes {
        graph.add_node(id, node);
    }
    graph.add_edge(START, ids[0].clone());
    for pair in ids.windows(2) {
        graph.add_conditional_edges(pair[0].clone(), status_router(), continue_or_stop(&pair[1]));
    }
    if let Some(last) = ids.last() {
        graph.add_edge(last.clone(), END);
    }
    graph.compile()
}

impl AriadneChain {
    /// Node id of the element at `index`.
    pub fn step_id(&self, index: usize) -> String {
        format!("{}_step_{}", self.name, index)
    }

    /// One node per element, halting on the first suspension or failure.
    pub fn to_graph(&self, runtime: &Runtime) -> Result<CompiledStateGraph<SdnaState>, CompilationError> {
        let chain = Arc::new(self.clone());
        let nodes = (0..self.elements.len())
            .map(|index| {
                let id = self.step_id(index);
                let node: Arc<dyn Node<SdnaState>> =
                    Arc::new(ElementNode::new(id.clone(), chain.clone(), index, runtime.clone()));
                (id, node)
            })
            .collect();
        chain_graph(nodes, format!("{}_empty", self.name))
    }

    /// Runs the thread through its graph.
    pub async fn execute_graph(&self, context: Context, runtime: &Runtime) -> Outcome {
        self.resume_graph(context, 0, runtime).await
    }

    /// Runs the thread's graph from element `resume_at`.
    pub async fn resume_graph(&self, context: Context, resume_at: usize, runtime: &Runtime) -> Outcome {
        if resume_at >= self.elements.len() {
            return Outcome::Success { context };
        }
        let start = self.step_id(resume_at);
        run_graph(self.to_graph(runtime), SdnaState::new(context), Some(&start))
            .await
            .into_outcome()
    }
}

impl Sdnac {
    /// `ariadne` (the thread as a subgraph) then `poimandres` (generation) when it succeeded.
    pub fn to_graph(&self, runtime: &Runtime) -> Result<CompiledStateGraph<SdnaState>, CompilationError> {
        self.graph_from(runtime, 0)
    }

    /// Unit graph whose thread subgraph is entered at element `resume_at`.
    fn graph_from(
        &self,
        runtime: &Runtime,
        resume_at: usize,
    ) -> Result<CompiledStateGraph<SdnaState>, CompilationError> {
        let mut ariadne = SubgraphNode::new(ARIADNE_NODE, self.ariadne.to_graph(runtime)?);
        if resume_at > 0 && resume_at < self.ariadne.elements.len() {
            ariadne = ariadne.with_entry(self.ariadne.step_id(resume_at));
        }
        let mut graph = StateGraph::<SdnaState>::new();
        graph
            .add_node(ARIADNE_NODE, Arc::new(ariadne))
            .add_node(
                POIMANDRES_NODE,
                Arc::new(GenerationNode::new(
                    POIMANDRES_NODE,
                    Arc::new(self.clone()),
                    runtime.clone(),
                )),
            )
            .add_edge(START, ARIADNE_NODE)
            .add_conditional_edges(ARIADNE_NODE, status_router(), continue_or_stop(POIMANDRES_NODE))
            .add_edge(POIMANDRES_NODE, END);
        graph.compile()
    }

    /// Node a run resumed at `resume_at` starts from: generation once the thread is done.
    fn entry_for(&self, resume_at: usize) -> &'static str {
        if resume_at > 0 && resume_at >= self.ariadne.elements.len() {
            POIMANDRES_NODE
        } else {
            ARIADNE_NODE
        }
    }

    pub async fn execute_graph(&self, context: Context, runtime: &Runtime) -> Outcome {
        self.resume_graph(context, 0, runtime).await
    }

    /// Continues the thread's graph from `resume_at`, then runs the generation node.
    pub async fn resume_graph(&self, context: Context, resume_at: usize, runtime: &Runtime) -> Outcome {
        run_graph(
            self.graph_from(runtime, resume_at),
            SdnaState::new(context),
            Some(self.entry_for(resume_at)),
        )
        .await
        .into_outcome()
    }
}

impl SdnaFlow {
    pub fn unit_id(&self, index: usize) -> String {
        format!("{}_unit_{}", self.name, index)
    }

    /// One subgraph node per unit, halting at the first unit that does not succeed.
    pub fn to_graph(&self, runtime: &Runtime) -> Result<CompiledStateGraph<SdnaState>, CompilationError> {
        self.graph_from(runtime, None)
    }

    /// Flow graph; `resume` is `(unit, resume_at)` for the unit entered mid-thread.
    fn graph_from(
        &self,
        runtime: &Runtime,
        resume: Option<(usize, usize)>,
    ) -> Result<CompiledStateGraph<SdnaState>, CompilationError> {
        let mut nodes = Vec::with_capacity(self.units.len());
        for (index, unit) in self.units.iter().enumerate() {
            let id = self.unit_id(index);
            let node: Arc<dyn Node<SdnaState>> = match resume {
                Some((halted, resume_at)) if halted == index => Arc::new(
                    FlowUnitNode::new(id.clone(), index, unit.graph_from(runtime, resume_at)?)
                        .with_entry(unit.entry_for(resume_at)),
                ),
                _ => Arc::new(FlowUnitNode::new(id.clone(), index, unit.to_graph(runtime)?)),
            };
            nodes.push((id, node));
        }
        chain_graph(nodes, format!("{}_empty", self.name))
    }

    pub async fn execute_graph(&self, context: Context, runtime: &Runtime) -> FlowOutcome {
        let state = run_graph(self.to_graph(runtime), SdnaState::new(context), None).await;
        Self::flow_outcome(state)
    }

    /// Resumes the unit at `resume_path[0]` from thread index `resume_at` on the graph,
    /// then runs the later units.
    pub async fn resume_graph(
        &self,
        context: Context,
        resume_path: &[usize],
        resume_at: usize,
        runtime: &Runtime,
    ) -> FlowOutcome {
        let unit = match resume_path.first() {
            Some(&unit) if unit < self.units.len() => unit,
            _ => return self.invalid_resume_path(context, resume_path),
        };
        info!(flow = %self.name, unit, resume_at, "flow graph resume");
        let start = self.unit_id(unit);
        let state = run_graph(
            self.graph_from(runtime, Some((unit, resume_at))),
            SdnaState::new(context),
            Some(&start),
        )
        .await;
        Self::flow_outcome(state)
    }

    fn flow_outcome(mut state: SdnaState) -> FlowOutcome {
        let resume_path = state.resume_path.take();
        FlowOutcome {
            outcome: state.into_outcome(),
            resume_path,
        }
    }
}
