//! Graph compilation of threads, units, flows, and refinement loops.
//!
//! Every layer can build a [`CompiledStateGraph`] over [`SdnaState`]: one node per stage,
//! conditional `continue`/`stop` routes keyed off the run status, and loop retries routed
//! back to the loop head. The sequential `execute` methods stay the reference behavior; the
//! graph runs must classify outcomes and suspend/resume exactly like them.

mod duo;
mod nodes;
mod units;

pub use nodes::{ElementNode, FlowUnitNode, GenerationNode, SubgraphNode};

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::duo::{DuoResult, DuoStatus};
use crate::error::SdnaError;
use crate::graph::{
    CompilationError, CompiledStateGraph, ConditionalRouterFn, PartialRun, DEFAULT_RECURSION_LIMIT, END,
};
use crate::outcome::{Outcome, PendingInput};
use crate::report::BlockedReport;

/// Run status carried through a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Nothing has halted the run yet.
    #[default]
    Pending,
    /// A loop observer approved.
    Success,
    AwaitingInput,
    Blocked,
    Error,
    /// A loop ran out of iterations.
    MaxIterations,
}

/// State flowing through compiled graphs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SdnaState {
    pub context: Context,
    pub status: RunStatus,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub pending: Option<PendingInput>,
    #[serde(default)]
    pub report: Option<BlockedReport>,
    /// Current loop iteration (1-based once the loop has started).
    #[serde(default)]
    pub iteration: usize,
    /// Index of the flow unit that halted the run.
    #[serde(default)]
    pub resume_path: Option<Vec<usize>>,
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub deliverable: Option<String>,
}

impl SdnaState {
    pub fn new(context: Context) -> Self {
        Self {
            context,
            ..Self::default()
        }
    }

    /// True until something halts the run.
    pub fn is_running(&self) -> bool {
        self.status == RunStatus::Pending
    }

    /// Records a canonical outcome: success keeps running, anything else halts.
    pub fn apply(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Success { context } => self.context = context,
            Outcome::AwaitingInput { context, pending } => {
                self.context = context;
                self.status = RunStatus::AwaitingInput;
                self.pending = Some(pending);
            }
            Outcome::Blocked { context, report } => {
                self.context = context;
                self.status = RunStatus::Blocked;
                self.report = report;
            }
            Outcome::Error { context, message } => {
                self.context = context;
                self.status = RunStatus::Error;
                self.error = Some(message);
            }
        }
    }

    /// Maps the final graph state back to the canonical outcome.
    pub fn into_outcome(self) -> Outcome {
        let context = self.context;
        match self.status {
            RunStatus::Pending | RunStatus::Success => Outcome::Success { context },
            RunStatus::AwaitingInput => match self.pending {
                Some(pending) => Outcome::AwaitingInput { context, pending },
                None => Outcome::Error {
                    context,
                    message: "awaiting input without a pending request".into(),
                },
            },
            RunStatus::Blocked => Outcome::Blocked {
                context,
                report: self.report,
            },
            RunStatus::Error => Outcome::Error {
                context,
                message: self.error.unwrap_or_default(),
            },
            RunStatus::MaxIterations => Outcome::Error {
                context,
                message: "max iterations reached".into(),
            },
        }
    }

    /// Maps the final state of a loop graph to a loop result.
    pub fn into_duo_result(self) -> DuoResult {
        let iterations = self.iteration;
        let (feedback, deliverable) = (self.feedback.clone(), self.deliverable.clone());
        match self.status {
            RunStatus::Success => DuoResult {
                feedback,
                deliverable,
                ..DuoResult::new(DuoStatus::Success, self.context, iterations)
            },
            RunStatus::MaxIterations => DuoResult {
                feedback,
                deliverable,
                ..DuoResult::new(DuoStatus::MaxIterations, self.context, iterations)
            },
            RunStatus::Pending => DuoResult {
                error: Some("loop ended without a verdict".into()),
                ..DuoResult::new(DuoStatus::Error, self.context, iterations)
            },
            _ => DuoResult::halted(self.into_outcome(), iterations),
        }
    }
}

const CONTINUE: &str = "continue";
const STOP: &str = "stop";

/// Router key: `continue` while running, `stop` once halted.
pub(crate) fn status_router() -> ConditionalRouterFn<SdnaState> {
    Arc::new(|state: &SdnaState| {
        if state.is_running() {
            CONTINUE.to_string()
        } else {
            STOP.to_string()
        }
    })
}

/// Path map sending `continue` to `next` and `stop` to END.
pub(crate) fn continue_or_stop(next: &str) -> Option<HashMap<String, String>> {
    Some(
        [
            (CONTINUE.to_string(), next.to_string()),
            (STOP.to_string(), END.to_string()),
        ]
        .into_iter()
        .collect(),
    )
}

/// Steps allowed beyond the planned node count before a run counts as runaway.
const STEP_SLACK: usize = 16;

/// Recursion limit for a graph that plans at most `steps` node executions.
pub(crate) fn step_limit(steps: usize) -> usize {
    steps.saturating_add(STEP_SLACK).max(DEFAULT_RECURSION_LIMIT)
}

/// Error state built from the last state a failed run reached, or from `fallback`.
fn failed(partial: PartialRun<SdnaState>, fallback: SdnaState) -> SdnaState {
    let mut state = partial.state.unwrap_or(fallback);
    state.status = RunStatus::Error;
    state.error = Some(partial.error.to_string());
    state.pending = None;
    state
}

/// Runs `graph` from `node`, turning an engine failure into an error state that keeps the
/// context and iteration reached so far.
pub(crate) async fn invoke_keeping_state(
    graph: &CompiledStateGraph<SdnaState>,
    state: SdnaState,
    node: &str,
) -> SdnaState {
    let fallback = state.clone();
    match graph.invoke_from_partial(state, node).await {
        Ok(state) => state,
        Err(partial) => failed(partial, fallback),
    }
}

/// Runs a compiled graph and maps engine failures to an error state.
pub(crate) async fn run_graph(
    graph: Result<CompiledStateGraph<SdnaState>, CompilationError>,
    state: SdnaState,
    start_at: Option<&str>,
) -> SdnaState {
    match graph {
        Ok(graph) => {
            let start = start_at.unwrap_or(graph.first_node_id()).to_string();
            invoke_keeping_state(&graph, state, &start).await
        }
        Err(e) => SdnaState {
            status: RunStatus::Error,
            error: Some(SdnaError::ExecutionFailed(e.to_string()).to_string()),
            ..state
        },
    }
}
