//! `to_graph` for the refinement loops.
//!
//! Both loops start at an `init` node that advances the iteration counter or ends the run
//! once the budget is spent. The two-stage loop routes on status after each stage and
//! jumps back to `init` from `judge`. The four-stage loop runs each stage on a copy of the
//! loop context and jumps back to `init` when the gate or observer rejects.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::context::Context;
use crate::duo::{
    gate_verdict, ovp_verdict, tag_or_text, text_at, DuoAgent, DuoAgentV2, DuoResult,
    ATTEMPT_FEEDBACK_KEY, CHALLENGE_KEY, CHALLENGE_OUTPUT_KEY, DELIVERABLE_KEY, FIRST_ATTEMPT,
    GATE_OUTPUT_KEY, GENERATOR_OUTPUT_KEY, ITERATION_KEY, OVP_OUTPUT_KEY, TARGET_OUTPUT_KEY,
};
use crate::error::SdnaError;
use crate::graph::{CompilationError, CompiledStateGraph, Next, Node, StateGraph, END, START};
use crate::runtime::Runtime;

use super::nodes::SubgraphNode;
use super::{continue_or_stop, run_graph, status_router, step_limit, RunStatus, SdnaState};

const INIT_NODE: &str = "init";

/// Node executions one pass of the loop can take, `init` included.
const TWO_STAGE_PASS: usize = 4;
const FOUR_STAGE_PASS: usize = 5;

/// Limit covering `max_iterations` full passes plus the final `init` check.
fn loop_limit(max_iterations: usize, pass: usize) -> usize {
    step_limit(max_iterations.saturating_mul(pass).saturating_add(1))
}

/// Loop head: next iteration, or `MaxIterations` once `max_iterations` have run.
struct IterationNode {
    max_iterations: usize,
}

#[async_trait]
impl Node<SdnaState> for IterationNode {
    fn id(&self) -> &str {
        INIT_NODE
    }

    async fn run(&self, mut state: SdnaState) -> Result<(SdnaState, Next), SdnaError> {
        if state.iteration >= self.max_iterations {
            state.status = RunStatus::MaxIterations;
            return Ok((state, Next::End));
        }
        state.iteration += 1;
        state.context.insert(ITERATION_KEY, state.iteration);
        Ok((state, Next::Continue))
    }
}

/// Two-stage loop stage: runs the unit on the loop context and keeps its text.
struct StageNode {
    inner: SubgraphNode,
    output_key: &'static str,
}

#[async_trait]
impl Node<SdnaState> for StageNode {
    fn id(&self) -> &str {
        &self.inner.id
    }

    async fn run(&self, state: SdnaState) -> Result<(SdnaState, Next), SdnaError> {
        let mut state = self.inner.run_inner(state).await;
        if state.is_running() {
            let text = state.context.text_of("text");
            state.context.insert(self.output_key, text);
        }
        Ok((state, Next::Continue))
    }
}

/// Reads the observer's approval and feedback keys.
struct JudgeNode {
    approval_key: String,
    feedback_key: String,
}

#[async_trait]
impl Node<SdnaState> for JudgeNode {
    fn id(&self) -> &str {
        "judge"
    }

    async fn run(&self, mut state: SdnaState) -> Result<(SdnaState, Next), SdnaError> {
        state.feedback = text_at(&state.context, &self.feedback_key);
        if state.context.is_truthy(&self.approval_key) {
            debug!(iteration = state.iteration, "approved");
            state.status = RunStatus::Success;
            return Ok((state, Next::End));
        }
        Ok((state, Next::Continue))
    }
}

impl DuoAgent {
    /// `init` → `target` → `ovp` → `judge` → back to `init`.
    pub fn to_graph(&self, runtime: &Runtime) -> Result<CompiledStateGraph<SdnaState>, CompilationError> {
        let mut graph = StateGraph::<SdnaState>::new()
            .with_recursion_limit(loop_limit(self.max_iterations, TWO_STAGE_PASS));
        graph
            .add_node(
                INIT_NODE,
                Arc::new(IterationNode {
                    max_iterations: self.max_iterations,
                }),
            )
            .add_node(
                "target",
                Arc::new(StageNode {
                    inner: SubgraphNode::new("target", self.target.to_graph(runtime)?),
                    output_key: TARGET_OUTPUT_KEY,
                }),
            )
            .add_node(
                "ovp",
                Arc::new(StageNode {
                    inner: SubgraphNode::new("ovp", self.ovp.to_graph(runtime)?),
                    output_key: OVP_OUTPUT_KEY,
                }),
            )
            .add_node(
                "judge",
                Arc::new(JudgeNode {
                    approval_key: self.approval_key.clone(),
                    feedback_key: self.feedback_key.clone(),
                }),
            )
            .add_edge(START, INIT_NODE)
            .add_edge(INIT_NODE, "target")
            .add_conditional_edges("target", status_router(), continue_or_stop("ovp"))
            .add_conditional_edges("ovp", status_router(), continue_or_stop("judge"))
            .add_edge("judge", INIT_NODE);
        graph.compile()
    }

    pub async fn execute_graph(&self, mut context: Context, runtime: &Runtime) -> DuoResult {
        context.insert(ITERATION_KEY, 0);
        let state = SdnaState {
            feedback: text_at(&context, &self.feedback_key),
            ..SdnaState::new(context)
        };
        run_graph(self.to_graph(runtime), state, None)
            .await
            .into_duo_result()
    }
}

#[derive(Clone, Copy, Debug)]
enum Role {
    Challenger,
    Generator,
    Gate,
    Ovp,
}

impl Role {
    fn id(&self) -> &'static str {
        match self {
            Role::Challenger => "challenger",
            Role::Generator => "generator",
            Role::Gate => "gate",
            Role::Ovp => "ovp",
        }
    }
}

/// Four-stage loop stage: runs on a copy of the loop context and folds back only its text.
struct IsolatedStageNode {
    role: Role,
    inner: SubgraphNode,
}

impl IsolatedStageNode {
    fn retry(mut state: SdnaState, feedback: String) -> (SdnaState, Next) {
        state.context.insert(ATTEMPT_FEEDBACK_KEY, feedback.clone());
        state.feedback = Some(feedback);
        (state, Next::Node(INIT_NODE.to_string()))
    }
}

#[async_trait]
impl Node<SdnaState> for IsolatedStageNode {
    fn id(&self) -> &str {
        self.role.id()
    }

    async fn run(&self, mut state: SdnaState) -> Result<(SdnaState, Next), SdnaError> {
        let stage = self.inner.run_inner(state.clone()).await;
        if !stage.is_running() {
            return Ok((stage, Next::End));
        }
        let text = stage.context.text_of("text");

        match self.role {
            Role::Challenger => {
                state.context.insert(CHALLENGE_KEY, tag_or_text(&text, "challenge"));
                state.context.insert(CHALLENGE_OUTPUT_KEY, text);
            }
            Role::Generator => {
                let deliverable = tag_or_text(&text, "deliverable");
                state.context.insert(DELIVERABLE_KEY, deliverable.clone());
                state.context.insert(GENERATOR_OUTPUT_KEY, text);
                state.deliverable = Some(deliverable);
            }
            Role::Gate => {
                let verdict = gate_verdict(&text);
                state.context.insert(GATE_OUTPUT_KEY, text);
                if let Err(feedback) = verdict {
                    debug!(iteration = state.iteration, "gate rejected");
                    return Ok(Self::retry(state, feedback));
                }
            }
            Role::Ovp => {
                let verdict = ovp_verdict(&text);
                state.context.insert(OVP_OUTPUT_KEY, text);
                match verdict {
                    Ok(feedback) => {
                        state.feedback = feedback;
                        state.deliverable = state.context.get_str(DELIVERABLE_KEY).map(String::from);
                        state.status = RunStatus::Success;
                        return Ok((state, Next::End));
                    }
                    Err(feedback) => return Ok(Self::retry(state, feedback)),
                }
            }
        }
        Ok((state, Next::Continue))
    }
}

impl DuoAgentV2 {
    /// `init` → `challenger` → `generator` → `gate` → `ovp`; rejections jump back to `init`.
    pub fn to_graph(&self, runtime: &Runtime) -> Result<CompiledStateGraph<SdnaState>, CompilationError> {
        let mut graph = StateGraph::<SdnaState>::new()
            .with_recursion_limit(loop_limit(self.max_iterations, FOUR_STAGE_PASS));
        graph.add_node(
            INIT_NODE,
            Arc::new(IterationNode {
                max_iterations: self.max_iterations,
            }),
        );
        let stages = [
            (Role::Challenger, &self.challenger),
            (Role::Generator, &self.generator),
            (Role::Gate, &self.gate),
            (Role::Ovp, &self.ovp),
        ];
        let mut previous = INIT_NODE;
        graph.add_edge(START, INIT_NODE);
        for (role, unit) in stages {
            graph.add_node(
                role.id(),
                Arc::new(IsolatedStageNode {
                    role,
                    inner: SubgraphNode::new(role.id(), unit.to_graph(runtime)?),
                }),
            );
            graph.add_edge(previous, role.id());
            previous = role.id();
        }
        graph.add_edge(previous, END);
        graph.compile()
    }

    pub async fn execute_graph(&self, mut context: Context, runtime: &Runtime) -> DuoResult {
        context.insert(ATTEMPT_FEEDBACK_KEY, FIRST_ATTEMPT);
        let state = SdnaState {
            feedback: Some(FIRST_ATTEMPT.to_string()),
            deliverable: context.get_str(DELIVERABLE_KEY).map(String::from),
            ..SdnaState::new(context)
        };
        run_graph(self.to_graph(runtime), state, None)
            .await
            .into_duo_result()
    }
}
