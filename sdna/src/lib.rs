//! # SDNA
//!
//! Composable agent workflows with a **context-in, outcome-out** design: one context map
//! flows through every layer, and every run ends in a tagged [`Outcome`].
//!
//! ## Layers
//!
//! - **Elements** ([`Element`]): literal, file, function, environment, knowledge, human gate,
//!   dovetail. Each reads the context and either writes keys or suspends for a human answer.
//! - **Threads** ([`AriadneChain`]): ordered elements; suspend with [`PendingInput`] and
//!   resume from `resume_at`.
//! - **Generation step** ([`poimandres`]): one model call over a templated goal, classified as
//!   success, blocked ([`BlockedReport`]), or error.
//! - **Units and flows** ([`Sdnac`], [`SdnaFlow`]): thread then generation; units in order.
//! - **Refinement loops** ([`DuoAgent`], [`DuoAgentV2`]): generator/observer iteration with a
//!   budget, reading verdicts from tags.
//! - **Graph scheduler** ([`graph`], [`compile`]): every layer compiles to a
//!   [`StateGraph`] over [`SdnaState`] with status-keyed conditional edges.
//!
//! External collaborators (model client, knowledge provider, function registry, block-report
//! store) live on a [`Runtime`] passed to every `execute`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sdna::{ariadne, inject_literal, sdnac, Context, HermesConfig, MockModel, Runtime};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let unit = sdnac(
//!     "greeter",
//!     ariadne("prep", vec![inject_literal("name", "world")]),
//!     HermesConfig::new("greeter", "Say hello to {name}"),
//! );
//! let runtime = Runtime::new().with_model(Arc::new(MockModel::new("hello, world!")));
//! let outcome = unit.execute(Context::new(), &runtime).await;
//! println!("{}: {}", outcome.status(), outcome.context().text_of("text"));
//! # }
//! ```

pub mod ariadne;
pub mod brain;
pub mod compile;
pub mod context;
pub mod definition;
pub mod duo;
pub mod error;
pub mod functions;
pub mod graph;
pub mod model;
pub mod outcome;
pub mod poimandres;
pub mod report;
pub mod runtime;
pub mod sdnac;
pub mod tags;
pub mod template;

pub use ariadne::{
    ariadne, dovetail, human, inject_brain, inject_env, inject_file, inject_func, inject_literal,
    AriadneChain, Dovetail, DovetailInput, Effect, Element,
};
pub use brain::{
    get_project_context, Brain, BrainConfig, BrainKnowledge, BrainRegistry, Cognition,
    HierarchicalBrain, HierarchicalBrainConfig, HierarchicalResult, KnowledgeProvider, ModelScorer,
    Neuron, NeuronScorer, NoKnowledge, ProjectBrain, StaticKnowledge, SubBrain,
};
pub use compile::{RunStatus, SdnaState};
pub use context::Context;
pub use definition::{from_json_str, from_yaml_str, load_definition};
pub use duo::{duo_agent, duo_agent_v2, DuoAgent, DuoAgentV2, DuoResult, DuoStatus};
pub use error::{SdnaError, TemplateError};
pub use functions::{BoundFunction, FunctionArgs, FunctionRegistry};
pub use graph::{
    generate_dot, generate_text, CompilationError, CompiledStateGraph, NameNode, Next, Node,
    StateGraph, END, START,
};
pub use model::{MockModel, MockReply, ModelClient, ModelOptions, ModelReply, UnconfiguredModel};
pub use outcome::{Outcome, PendingInput, Status};
pub use poimandres::{HermesConfig, PoimandresResult};
pub use report::{
    BlockReason, BlockReportStore, BlockedReport, FileBlockReportStore, InMemoryBlockReportStore,
};
pub use runtime::Runtime;
pub use sdnac::{sdna_flow, sdnac, FlowOutcome, SdnaFlow, Sdnac};
pub use tags::{extract_tags, tag_equals, ExtractedTags, TagMatch};

#[cfg(test)]
mod test_logging {
    use ctor::ctor;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::Layer;

    #[ctor]
    fn init() {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_filter(filter),
            )
            .try_init();
    }
}
