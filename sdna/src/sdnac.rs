//! Units of work (thread + generation step) and flows of units.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::ariadne::AriadneChain;
use crate::context::Context;
use crate::outcome::{Outcome, Status};
use crate::poimandres::{self, HermesConfig, PoimandresResult};
use crate::runtime::Runtime;

/// One thread that prepares the context, then one generation step over it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sdnac {
    pub name: String,
    pub ariadne: AriadneChain,
    pub config: HermesConfig,
}

/// Builds a unit of work.
pub fn sdnac(name: impl Into<String>, ariadne: AriadneChain, config: HermesConfig) -> Sdnac {
    Sdnac::new(name, ariadne, config)
}

impl Sdnac {
    pub fn new(name: impl Into<String>, ariadne: AriadneChain, config: HermesConfig) -> Self {
        Self {
            name: name.into(),
            ariadne,
            config,
        }
    }

    /// Thread, then (only on thread success) the generation step.
    pub async fn execute(&self, context: Context, runtime: &Runtime) -> Outcome {
        self.resume(context, 0, runtime).await
    }

    /// Continues the thread from `resume_at`, then runs the generation step.
    pub async fn resume(&self, context: Context, resume_at: usize, runtime: &Runtime) -> Outcome {
        info!(unit = %self.name, resume_at, "unit start");
        match self.ariadne.execute_from(context, resume_at, runtime).await {
            Outcome::Success { context } => self.generate(context, runtime).await,
            other => other,
        }
    }

    /// Generation step over a prepared context; success merges the step's output on top.
    pub(crate) async fn generate(&self, mut context: Context, runtime: &Runtime) -> Outcome {
        match poimandres::execute(&self.config, &context, runtime).await {
            PoimandresResult::Success { output, .. } => {
                context.merge(output);
                Outcome::Success { context }
            }
            PoimandresResult::Blocked { report, .. } => Outcome::Blocked {
                context,
                report: Some(report),
            },
            PoimandresResult::Error { message } => Outcome::Error { context, message },
        }
    }
}

/// Outcome of a flow plus, when it halted, the index of the unit that halted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowOutcome {
    pub outcome: Outcome,
    #[serde(default)]
    pub resume_path: Option<Vec<usize>>,
}

impl FlowOutcome {
    pub fn status(&self) -> Status {
        self.outcome.status()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }

    pub fn context(&self) -> &Context {
        self.outcome.context()
    }
}

/// Units run in order until the first one that does not succeed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdnaFlow {
    pub name: String,
    #[serde(default)]
    pub units: Vec<Sdnac>,
}

/// Builds a flow.
pub fn sdna_flow(name: impl Into<String>, units: Vec<Sdnac>) -> SdnaFlow {
    SdnaFlow::new(name, units)
}

impl SdnaFlow {
    pub fn new(name: impl Into<String>, units: Vec<Sdnac>) -> Self {
        Self {
            name: name.into(),
            units,
        }
    }

    pub async fn execute(&self, context: Context, runtime: &Runtime) -> FlowOutcome {
        info!(flow = %self.name, units = self.units.len(), "flow start");
        self.run_from(context, 0, 0, runtime).await
    }

    /// Resumes the unit at `resume_path[0]` from thread index `resume_at`, then runs the rest.
    pub async fn resume(
        &self,
        context: Context,
        resume_path: &[usize],
        resume_at: usize,
        runtime: &Runtime,
    ) -> FlowOutcome {
        match resume_path.first() {
            Some(&unit) if unit < self.units.len() => {
                info!(flow = %self.name, unit, resume_at, "flow resume");
                self.run_from(context, unit, resume_at, runtime).await
            }
            _ => self.invalid_resume_path(context, resume_path),
        }
    }

    pub(crate) fn invalid_resume_path(&self, context: Context, resume_path: &[usize]) -> FlowOutcome {
        FlowOutcome {
            outcome: Outcome::Error {
                context,
                message: format!("invalid resume path {:?} for flow '{}'", resume_path, self.name),
            },
            resume_path: None,
        }
    }

    async fn run_from(&self, mut context: Context, first: usize, resume_at: usize, runtime: &Runtime) -> FlowOutcome {
        for (index, unit) in self.units.iter().enumerate().skip(first) {
            let start = if index == first { resume_at } else { 0 };
            match unit.resume(context, start, runtime).await {
                Outcome::Success { context: next } => context = next,
                halted => {
                    info!(flow = %self.name, unit = index, status = %halted.status(), "flow halted");
                    return FlowOutcome {
                        outcome: halted,
                        resume_path: Some(vec![index]),
                    };
                }
            }
        }
        FlowOutcome {
            outcome: Outcome::Success { context },
            resume_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ariadne::{ariadne, human, inject_literal};
    use crate::model::{MockModel, MockReply};
    use serde_json::json;
    use std::sync::Arc;

    fn unit(name: &str, goal: &str) -> Sdnac {
        sdnac(name, ariadne(name, vec![inject_literal(format!("{}_ran", name), true)]), HermesConfig::new(name, goal))
    }

    /// **Scenario**: A unit merges the generation output on top of the thread's context.
    #[tokio::test]
    async fn unit_merges_generation_output() {
        let rt = Runtime::new().with_model(Arc::new(MockModel::new("generated")));
        let out = unit("gen", "Write").execute(Context::new().with("seed", 1), &rt).await;
        assert_eq!(
            out,
            Outcome::Success {
                context: Context::new()
                    .with("seed", 1)
                    .with("gen_ran", true)
                    .with("text", "generated")
            }
        );
    }

    /// **Scenario**: A declared tag missing from the reply keeps the value already in context.
    #[tokio::test]
    async fn missing_output_tag_keeps_earlier_value() {
        let rt = Runtime::new().with_model(Arc::new(MockModel::new("<verdict>ok</verdict>")));
        let tagged = sdnac(
            "review",
            ariadne("review", vec![]),
            HermesConfig::new("review", "Review").with_output_tags(["verdict", "score"]),
        );
        let out = tagged.execute(Context::new().with("score", 7), &rt).await;
        assert_eq!(out.context().get("score"), Some(&json!(7)));
        assert_eq!(out.context().get_str("verdict"), Some("ok"));
    }

    #[tokio::test]
    async fn unit_thread_suspension_skips_generation() {
        let mock = Arc::new(MockModel::new("never"));
        let rt = Runtime::new().with_model(mock.clone());
        let gated = sdnac(
            "gated",
            ariadne("prep", vec![human("Topic?", "topic", None)]),
            HermesConfig::new("gated", "About {topic}"),
        );
        let out = gated.execute(Context::new(), &rt).await;
        assert_eq!(out.status(), Status::AwaitingInput);
        assert_eq!(mock.calls(), 0);

        let pending = out.pending().cloned().unwrap();
        let resumed = gated
            .resume(pending.answer(out.into_context(), "rust"), pending.resume_at, &rt)
            .await;
        assert!(resumed.is_success());
        assert!(mock.prompts()[0].starts_with("About rust"));
    }

    /// **Scenario**: The flow halts at the first failing unit and never calls later ones.
    #[tokio::test]
    async fn flow_halts_with_resume_path() {
        let mock = Arc::new(
            MockModel::new("ok").on_prompt("SECOND", vec![MockReply::fail("overloaded")]),
        );
        let rt = Runtime::new().with_model(mock.clone());
        let flow = sdna_flow(
            "pipeline",
            vec![unit("a", "FIRST"), unit("b", "SECOND"), unit("c", "THIRD")],
        );
        let out = flow.execute(Context::new(), &rt).await;
        assert_eq!(out.status(), Status::Error);
        assert_eq!(out.resume_path, Some(vec![1]));
        assert_eq!(out.context().get("a_ran"), Some(&json!(true)));
        assert_eq!(mock.calls_matching("THIRD"), 0);
    }

    #[tokio::test]
    async fn flow_resume_rejects_bad_path() {
        let flow = sdna_flow("pipeline", vec![unit("a", "FIRST")]);
        let out = flow.resume(Context::new(), &[3], 0, &Runtime::new()).await;
        assert_eq!(out.status(), Status::Error);
        assert!(out.outcome.error_message().unwrap().contains("invalid resume path"));
        assert!(sdna_flow("empty", vec![]).execute(Context::new(), &Runtime::new()).await.is_success());
    }
}
