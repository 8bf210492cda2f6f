//! Four-stage loop: challenger, generator, gate, observer.
//!
//! The loop keeps its own context. Each stage runs on a copy of it; only the stage's raw text
//! (under a stage-qualified key) and the tagged values the loop reads come back.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::Context;
use crate::outcome::Outcome;
use crate::runtime::Runtime;
use crate::sdnac::Sdnac;
use crate::tags::{extract_tags, tag_equals};

use super::{DuoResult, DuoStatus, ITERATION_KEY, OVP_OUTPUT_KEY};

pub const DEFAULT_V2_MAX_ITERATIONS: usize = 5;

pub(crate) const ATTEMPT_FEEDBACK_KEY: &str = "attempt_feedback";
pub(crate) const FIRST_ATTEMPT: &str = "(first attempt)";
pub(crate) const CHALLENGE_KEY: &str = "challenge";
pub(crate) const CHALLENGE_OUTPUT_KEY: &str = "challenge_output";
pub(crate) const DELIVERABLE_KEY: &str = "deliverable";
pub(crate) const GENERATOR_OUTPUT_KEY: &str = "generator_output";
pub(crate) const GATE_OUTPUT_KEY: &str = "gate_output";
pub(crate) const GATE_REJECTED: &str = "Gate rejected, try again";
pub(crate) const OVP_REJECTED: &str = "OVP rejected, try again";

fn default_max_iterations() -> usize {
    DEFAULT_V2_MAX_ITERATIONS
}

/// Challenger, generator, gate, and observer units with an iteration budget.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuoAgentV2 {
    pub name: String,
    /// Emits `<challenge>`.
    pub challenger: Sdnac,
    /// Emits `<deliverable>`.
    pub generator: Sdnac,
    /// Emits `<gate-passed>` and `<gate-feedback>`.
    pub gate: Sdnac,
    /// Emits `<ovp-approved>` and `<ovp-feedback>`.
    pub ovp: Sdnac,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
}

/// Builds a four-stage loop with the default budget.
pub fn duo_agent_v2(
    name: impl Into<String>,
    challenger: Sdnac,
    generator: Sdnac,
    gate: Sdnac,
    ovp: Sdnac,
) -> DuoAgentV2 {
    DuoAgentV2 {
        name: name.into(),
        challenger,
        generator,
        gate,
        ovp,
        max_iterations: DEFAULT_V2_MAX_ITERATIONS,
    }
}

/// A tag's value, falling back to the whole text when the tag is absent or empty.
pub(crate) fn tag_or_text(text: &str, tag: &str) -> String {
    extract_tags(text, &[tag])
        .remove(tag)
        .flatten()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| text.to_string())
}

/// Gate verdict: `Ok(())` to proceed, `Err(feedback)` to retry.
pub(crate) fn gate_verdict(text: &str) -> Result<(), String> {
    let tags = extract_tags(text, &["gate-passed", "gate-feedback"]);
    if tag_equals(&tags, "gate-passed", "true") {
        Ok(())
    } else {
        Err(non_empty(tags.get("gate-feedback").cloned().flatten()).unwrap_or_else(|| GATE_REJECTED.into()))
    }
}

/// Observer verdict: `Ok(feedback)` when approved, `Err(feedback)` to retry.
pub(crate) fn ovp_verdict(text: &str) -> Result<Option<String>, String> {
    let tags = extract_tags(text, &["ovp-approved", "ovp-feedback"]);
    let feedback = non_empty(tags.get("ovp-feedback").cloned().flatten());
    if tag_equals(&tags, "ovp-approved", "true") {
        Ok(feedback)
    } else {
        Err(feedback.unwrap_or_else(|| OVP_REJECTED.into()))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl DuoAgentV2 {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Runs one stage on a copy of the loop context; returns its text or the halted result.
    async fn stage(
        &self,
        label: &str,
        unit: &Sdnac,
        context: &Context,
        iteration: usize,
        runtime: &Runtime,
    ) -> Result<String, DuoResult> {
        debug!(duo = %self.name, iteration, stage = label, "stage");
        match unit.execute(context.clone(), runtime).await {
            Outcome::Success { context } => Ok(context.text_of("text")),
            halted => Err(DuoResult::halted(halted, iteration)),
        }
    }

    pub async fn execute(&self, mut context: Context, runtime: &Runtime) -> DuoResult {
        info!(duo = %self.name, max_iterations = self.max_iterations, "duo v2 start");
        context.insert(ATTEMPT_FEEDBACK_KEY, FIRST_ATTEMPT);

        for iteration in 1..=self.max_iterations {
            context.insert(ITERATION_KEY, iteration);

            let text = match self.stage("challenger", &self.challenger, &context, iteration, runtime).await {
                Ok(text) => text,
                Err(halted) => return halted,
            };
            context.insert(CHALLENGE_KEY, tag_or_text(&text, "challenge"));
            context.insert(CHALLENGE_OUTPUT_KEY, text);

            let text = match self.stage("generator", &self.generator, &context, iteration, runtime).await {
                Ok(text) => text,
                Err(halted) => return halted,
            };
            context.insert(DELIVERABLE_KEY, tag_or_text(&text, "deliverable"));
            context.insert(GENERATOR_OUTPUT_KEY, text);

            let text = match self.stage("gate", &self.gate, &context, iteration, runtime).await {
                Ok(text) => text,
                Err(halted) => return halted,
            };
            let verdict = gate_verdict(&text);
            context.insert(GATE_OUTPUT_KEY, text);
            if let Err(feedback) = verdict {
                debug!(duo = %self.name, iteration, "gate rejected");
                context.insert(ATTEMPT_FEEDBACK_KEY, feedback);
                continue;
            }

            let text = match self.stage("ovp", &self.ovp, &context, iteration, runtime).await {
                Ok(text) => text,
                Err(halted) => return halted,
            };
            let verdict = ovp_verdict(&text);
            context.insert(OVP_OUTPUT_KEY, text);
            match verdict {
                Ok(feedback) => {
                    info!(duo = %self.name, iteration, "approved");
                    let deliverable = context.get_str(DELIVERABLE_KEY).map(String::from);
                    return DuoResult {
                        feedback,
                        deliverable,
                        ..DuoResult::new(DuoStatus::Success, context, iteration)
                    };
                }
                Err(feedback) => {
                    context.insert(ATTEMPT_FEEDBACK_KEY, feedback);
                }
            }
        }

        info!(duo = %self.name, "max iterations reached");
        let feedback = context.get_str(ATTEMPT_FEEDBACK_KEY).map(String::from);
        let deliverable = context.get_str(DELIVERABLE_KEY).map(String::from);
        DuoResult {
            feedback,
            deliverable,
            ..DuoResult::new(DuoStatus::MaxIterations, context, self.max_iterations)
        }
    }
}
