//! Ariadne: threads of context elements.
//!
//! A thread runs its elements in order against an accumulating context. A human gate stops
//! the run with [`Outcome::AwaitingInput`] whose `resume_at` points just past the gate; an
//! element failure stops it with [`Outcome::Error`] and the context as it was before that
//! element. Each element's writes are committed together or not at all.

mod dovetail;
mod element;

pub use dovetail::{Dovetail, DovetailInput};
pub use element::{
    dovetail, human, inject_brain, inject_env, inject_file, inject_func, inject_literal, Effect,
    Element, CONTEXT_REF_PREFIX,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::Context;
use crate::outcome::{Outcome, PendingInput};
use crate::runtime::Runtime;

/// Named, ordered sequence of elements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AriadneChain {
    pub name: String,
    #[serde(default)]
    pub elements: Vec<Element>,
}

/// Builds a thread.
pub fn ariadne(name: impl Into<String>, elements: Vec<Element>) -> AriadneChain {
    AriadneChain::new(name, elements)
}

impl AriadneChain {
    pub fn new(name: impl Into<String>, elements: Vec<Element>) -> Self {
        Self {
            name: name.into(),
            elements,
        }
    }

    /// Runs every element from the start.
    pub async fn execute(&self, context: Context, runtime: &Runtime) -> Outcome {
        self.execute_from(context, 0, runtime).await
    }

    /// Runs elements from index `start_at`. Resume by passing the suspended context with the
    /// answer merged in and the `resume_at` of the suspension.
    pub async fn execute_from(&self, mut context: Context, start_at: usize, runtime: &Runtime) -> Outcome {
        info!(thread = %self.name, start_at, elements = self.elements.len(), "thread start");
        for (index, element) in self.elements.iter().enumerate().skip(start_at) {
            match self.step(index, element, context, runtime).await {
                Ok(next) => context = next,
                Err(outcome) => return outcome,
            }
        }
        info!(thread = %self.name, "thread complete");
        Outcome::Success { context }
    }

    /// Applies one element. `Err` carries the outcome that stops the thread.
    pub(crate) async fn step(
        &self,
        index: usize,
        element: &Element,
        mut context: Context,
        runtime: &Runtime,
    ) -> Result<Context, Outcome> {
        debug!(thread = %self.name, element = index, kind = element.kind(), "apply element");
        match element.apply(&context, runtime).await {
            Ok(Effect::Update(writes)) => {
                for (key, value) in writes {
                    context.insert(key, value);
                }
                Ok(context)
            }
            Ok(Effect::Suspend {
                prompt,
                input_key,
                choices,
            }) => {
                info!(thread = %self.name, element = index, input_key = %input_key, "awaiting input");
                Err(Outcome::AwaitingInput {
                    context,
                    pending: PendingInput {
                        prompt,
                        input_key,
                        choices,
                        resume_at: index + 1,
                    },
                })
            }
            Err(e) => {
                debug!(thread = %self.name, element = index, error = %e, "element failed");
                Err(Outcome::Error {
                    context,
                    message: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::Status;
    use serde_json::json;

    fn gated() -> AriadneChain {
        ariadne(
            "gated",
            vec![
                inject_literal("a", 1),
                human("Name?", "name", None),
                inject_literal("b", 2),
            ],
        )
    }

    /// **Scenario**: A gate at index 1 suspends with resume_at 2 and only element 0 applied.
    #[tokio::test]
    async fn human_gate_suspends_then_resumes() {
        let rt = Runtime::new();
        let out = gated().execute(Context::new(), &rt).await;
        assert_eq!(out.status(), Status::AwaitingInput);
        let pending = out.pending().cloned().unwrap();
        assert_eq!(pending.resume_at, 2);
        assert_eq!(out.context(), &Context::new().with("a", 1));

        let resumed_ctx = pending.answer(out.into_context(), "ana");
        let done = gated().execute_from(resumed_ctx, pending.resume_at, &rt).await;
        assert_eq!(
            done,
            Outcome::Success {
                context: Context::new().with("a", 1).with("name", "ana").with("b", 2)
            }
        );
    }

    /// **Scenario**: A failing element reports the context from before it ran.
    #[tokio::test]
    async fn failure_keeps_previous_context() {
        let chain = ariadne(
            "broken",
            vec![
                inject_literal("a", 1),
                inject_func("x", "missing_mod", "f", Default::default()),
                inject_literal("never", true),
            ],
        );
        let out = chain.execute(Context::new().with("seed", 0), &Runtime::new()).await;
        assert_eq!(out.error_message(), Some("no module named 'missing_mod'"));
        assert_eq!(out.context(), &Context::new().with("seed", 0).with("a", 1));
        assert!(out.context().get("never").is_none());
    }

    #[tokio::test]
    async fn empty_thread_succeeds_with_input() {
        let out = ariadne("empty", vec![])
            .execute(Context::new().with("k", json!("v")), &Runtime::new())
            .await;
        assert!(out.is_success());
        assert_eq!(out.context().get_str("k"), Some("v"));
    }
}
