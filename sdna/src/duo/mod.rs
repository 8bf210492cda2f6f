//! DUO: generator/observer refinement loops over units of work.
//!
//! [`DuoAgent`] runs a target unit then an observer ("OVP") unit until the observer sets a
//! truthy approval key or the iteration budget runs out. [`DuoAgentV2`] adds a challenger
//! before the target and a gate between target and observer, and reads every decision from
//! tags in the stages' text.
//!
//! Any stage outcome other than success ends the loop at once with that stage's status.

mod v2;

pub use v2::{duo_agent_v2, DuoAgentV2, DEFAULT_V2_MAX_ITERATIONS};
pub(crate) use v2::{
    gate_verdict, ovp_verdict, tag_or_text, ATTEMPT_FEEDBACK_KEY, CHALLENGE_KEY, CHALLENGE_OUTPUT_KEY,
    DELIVERABLE_KEY, FIRST_ATTEMPT, GATE_OUTPUT_KEY, GENERATOR_OUTPUT_KEY,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::{value_to_text, Context};
use crate::outcome::{Outcome, PendingInput};
use crate::report::BlockedReport;
use crate::runtime::Runtime;
use crate::sdnac::Sdnac;

pub const DEFAULT_MAX_ITERATIONS: usize = 3;
pub const DEFAULT_APPROVAL_KEY: &str = "ovp_approved";
pub const DEFAULT_FEEDBACK_KEY: &str = "ovp_feedback";

/// Context key holding the 1-based iteration number.
pub const ITERATION_KEY: &str = "duo_iteration";
pub const TARGET_OUTPUT_KEY: &str = "target_output";
pub const OVP_OUTPUT_KEY: &str = "ovp_output";

/// Loop outcome tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuoStatus {
    /// The observer approved.
    Success,
    /// The budget ran out without approval.
    MaxIterations,
    Blocked,
    Error,
    AwaitingInput,
}

/// Result of a refinement loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuoResult {
    pub status: DuoStatus,
    pub context: Context,
    /// Iterations started, including the one that ended the loop.
    pub iterations: usize,
    #[serde(default)]
    pub error: Option<String>,
    /// Last observer (or gate) feedback.
    #[serde(default)]
    pub feedback: Option<String>,
    #[serde(default)]
    pub pending: Option<PendingInput>,
    #[serde(default)]
    pub report: Option<BlockedReport>,
    /// Last deliverable (four-stage loop only).
    #[serde(default)]
    pub deliverable: Option<String>,
}

impl DuoResult {
    pub(crate) fn new(status: DuoStatus, context: Context, iterations: usize) -> Self {
        Self {
            status,
            context,
            iterations,
            error: None,
            feedback: None,
            pending: None,
            report: None,
            deliverable: None,
        }
    }

    /// Maps a stage outcome that did not succeed into a loop result.
    pub(crate) fn halted(outcome: Outcome, iterations: usize) -> Self {
        match outcome {
            Outcome::Success { context } => Self::new(DuoStatus::Success, context, iterations),
            Outcome::AwaitingInput { context, pending } => Self {
                pending: Some(pending),
                ..Self::new(DuoStatus::AwaitingInput, context, iterations)
            },
            Outcome::Blocked { context, report } => Self {
                report,
                ..Self::new(DuoStatus::Blocked, context, iterations)
            },
            Outcome::Error { context, message } => Self {
                error: Some(message),
                ..Self::new(DuoStatus::Error, context, iterations)
            },
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == DuoStatus::Success
    }
}

/// Text of a context value, ignoring absent and null.
pub(crate) fn text_at(context: &Context, key: &str) -> Option<String> {
    context.get(key).filter(|v| !v.is_null()).map(value_to_text)
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_approval_key() -> String {
    DEFAULT_APPROVAL_KEY.to_string()
}

fn default_feedback_key() -> String {
    DEFAULT_FEEDBACK_KEY.to_string()
}

/// Two-stage refinement loop: target, then observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuoAgent {
    pub name: String,
    pub target: Sdnac,
    pub ovp: Sdnac,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    /// Observer's context key that approves when truthy.
    #[serde(default = "default_approval_key")]
    pub approval_key: String,
    #[serde(default = "default_feedback_key")]
    pub feedback_key: String,
}

/// Builds a two-stage loop with default budget and keys.
pub fn duo_agent(name: impl Into<String>, target: Sdnac, ovp: Sdnac) -> DuoAgent {
    DuoAgent::new(name, target, ovp)
}

impl DuoAgent {
    pub fn new(name: impl Into<String>, target: Sdnac, ovp: Sdnac) -> Self {
        Self {
            name: name.into(),
            target,
            ovp,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            approval_key: default_approval_key(),
            feedback_key: default_feedback_key(),
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_keys(mut self, approval_key: impl Into<String>, feedback_key: impl Into<String>) -> Self {
        self.approval_key = approval_key.into();
        self.feedback_key = feedback_key.into();
        self
    }

    pub async fn execute(&self, mut context: Context, runtime: &Runtime) -> DuoResult {
        info!(duo = %self.name, max_iterations = self.max_iterations, "duo start");
        context.insert(ITERATION_KEY, 0);

        for iteration in 1..=self.max_iterations {
            context.insert(ITERATION_KEY, iteration);
            debug!(duo = %self.name, iteration, "target");

            context = match self.target.execute(context, runtime).await {
                Outcome::Success { mut context } => {
                    let text = context.text_of("text");
                    context.insert(TARGET_OUTPUT_KEY, text);
                    context
                }
                halted => return DuoResult::halted(halted, iteration),
            };

            debug!(duo = %self.name, iteration, "observer");
            context = match self.ovp.execute(context, runtime).await {
                Outcome::Success { mut context } => {
                    let text = context.text_of("text");
                    context.insert(OVP_OUTPUT_KEY, text);
                    context
                }
                halted => return DuoResult::halted(halted, iteration),
            };

            let feedback = text_at(&context, &self.feedback_key);
            if context.is_truthy(&self.approval_key) {
                info!(duo = %self.name, iteration, "approved");
                return DuoResult {
                    feedback,
                    ..DuoResult::new(DuoStatus::Success, context, iteration)
                };
            }
        }

        info!(duo = %self.name, "max iterations reached");
        let feedback = text_at(&context, &self.feedback_key);
        DuoResult {
            feedback,
            ..DuoResult::new(DuoStatus::MaxIterations, context, self.max_iterations)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ariadne::ariadne;
    use crate::model::{MockModel, MockReply};
    use crate::poimandres::HermesConfig;
    use std::sync::Arc;

    fn stage(name: &str, goal: &str, tags: &[&str]) -> Sdnac {
        Sdnac::new(
            name,
            ariadne(name, vec![]),
            HermesConfig::new(name, goal).with_output_tags(tags.iter().copied()),
        )
    }

    fn duo(ovp_replies: Vec<MockReply>) -> (DuoAgent, Runtime, Arc<MockModel>) {
        let mock = Arc::new(
            MockModel::new("draft")
                .on_prompt("[REVIEW]", ovp_replies),
        );
        let agent = duo_agent(
            "writer",
            stage("target", "[WRITE] iteration {duo_iteration}", &[]),
            stage("ovp", "[REVIEW] {target_output}", &["ovp_approved", "ovp_feedback"]),
        );
        (agent, Runtime::new().with_model(mock.clone()), mock)
    }

    /// **Scenario**: An observer that approves at once ends the loop after one iteration.
    #[tokio::test]
    async fn approves_first_iteration() {
        let (agent, rt, mock) = duo(vec![MockReply::text(
            "<ovp_approved>true</ovp_approved><ovp_feedback>great</ovp_feedback>",
        )]);
        let result = agent.execute(Context::new(), &rt).await;
        assert_eq!(result.status, DuoStatus::Success);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.feedback.as_deref(), Some("great"));
        assert_eq!(result.context.get_str(TARGET_OUTPUT_KEY), Some("draft"));
        assert_eq!(mock.calls_matching("[WRITE]"), 1);
    }

    /// **Scenario**: An observer that never approves exhausts the budget.
    #[tokio::test]
    async fn never_approves_hits_max() {
        let (agent, rt, mock) = duo(vec![MockReply::text(
            "<ovp_approved>false</ovp_approved><ovp_feedback>more detail</ovp_feedback>",
        )]);
        let result = agent.with_max_iterations(4).execute(Context::new(), &rt).await;
        assert_eq!(result.status, DuoStatus::MaxIterations);
        assert_eq!(result.iterations, 4);
        assert_eq!(result.feedback.as_deref(), Some("more detail"));
        assert_eq!(mock.calls_matching("[WRITE]"), 4);
        assert_eq!(mock.calls_matching("[REVIEW]"), 4);
        assert!(mock.prompts()[6].contains("iteration 4"));
    }

    /// **Scenario**: A failing target stops the loop before the observer runs.
    #[tokio::test]
    async fn target_error_short_circuits() {
        let mock = Arc::new(MockModel::new("ok").on_prompt("[WRITE]", vec![MockReply::fail("down")]));
        let agent = duo_agent(
            "writer",
            stage("target", "[WRITE]", &[]),
            stage("ovp", "[REVIEW]", &[]),
        );
        let result = agent.execute(Context::new(), &Runtime::new().with_model(mock.clone())).await;
        assert_eq!(result.status, DuoStatus::Error);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.error.as_deref(), Some("down"));
        assert_eq!(mock.calls_matching("[REVIEW]"), 0);
    }
}
