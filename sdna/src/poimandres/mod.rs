//! Poimandres: the generation step. One model call, classified as success, blocked, or error.
//!
//! Order of work: optional knowledge injection, goal templating (a templating failure stops
//! here, before any call), blocked-report instruction appended, model call drained to its last
//! text, then the text is checked for a blocked report before it is treated as success.

mod config;

pub use config::{HermesConfig, BRACE_FILE};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::brain::DEFAULT_MAX_NEURONS;
use crate::context::Context;
use crate::error::SdnaError;
use crate::model::complete;
use crate::report::{blocked_instruction, parse_blocked_from_text, BlockedReport};
use crate::runtime::Runtime;
use crate::tags::{extract_tags, tag_bool};

/// Classified result of one generation step.
#[derive(Debug, Clone, PartialEq)]
pub enum PoimandresResult {
    /// `output` holds `text` plus any configured output tags.
    Success {
        output: Map<String, Value>,
        session_id: Option<String>,
    },
    Blocked {
        report: BlockedReport,
        session_id: Option<String>,
    },
    Error {
        message: String,
    },
}

impl PoimandresResult {
    pub fn is_success(&self) -> bool {
        matches!(self, PoimandresResult::Success { .. })
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, PoimandresResult::Blocked { .. })
    }

    pub fn output(&self) -> Option<&Map<String, Value>> {
        match self {
            PoimandresResult::Success { output, .. } => Some(output),
            _ => None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        match self {
            PoimandresResult::Success { session_id, .. } | PoimandresResult::Blocked { session_id, .. } => {
                session_id.as_deref()
            }
            PoimandresResult::Error { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            PoimandresResult::Error { message } => Some(message),
            _ => None,
        }
    }
}

fn output_from_text(config: &HermesConfig, text: String) -> Map<String, Value> {
    let mut output = Map::new();
    if !config.output_tags.is_empty() {
        let names: Vec<&str> = config.output_tags.iter().map(String::as_str).collect();
        for (tag, value) in extract_tags(&text, &names) {
            // Absent tags leave whatever an earlier step wrote.
            if let Some(v) = value {
                output.insert(tag, tag_bool(&v).map_or(Value::String(v), Value::Bool));
            }
        }
    }
    output.insert("text".into(), Value::String(text));
    output
}

/// Runs one generation step over `context`. Never fails; every path is classified.
pub async fn execute(config: &HermesConfig, context: &Context, runtime: &Runtime) -> PoimandresResult {
    info!(unit = %config.name, "generation start");
    let mut inputs = context.as_map().clone();

    if let (Some(query), Some(root)) = (&config.brain_query, &config.brain_project_root) {
        let injected = match runtime.knowledge.query(root, query, DEFAULT_MAX_NEURONS).await {
            Ok(cognition) => cognition.instructions,
            Err(SdnaError::Knowledge(message)) => format!("[Brain query failed: {}]", message),
            Err(e) => format!("[Brain query failed: {}]", e),
        };
        inputs.insert(config.inject_context_as.clone(), Value::String(injected));
    }

    let goal = match config.resolve_goal_with(&runtime.template_defaults, &inputs) {
        Ok(goal) => goal,
        Err(e) => {
            return PoimandresResult::Error {
                message: e.to_string(),
            }
        }
    };
    let options = match config.to_options() {
        Ok(options) => options,
        Err(e) => {
            return PoimandresResult::Error {
                message: e.to_string(),
            }
        }
    };
    let prompt = format!("{}{}", goal, blocked_instruction());

    let reply = match complete(runtime.model.as_ref(), &prompt, &options).await {
        Ok(reply) => reply,
        Err(e) => {
            warn!(unit = %config.name, error = %e, "generation failed");
            return PoimandresResult::Error {
                message: e.to_string(),
            };
        }
    };

    if !reply.text.is_empty() {
        if let Some(mut report) = parse_blocked_from_text(&reply.text) {
            match runtime.reports.append(&config.name, &report).await {
                Ok(path) => report.cached_path = Some(path),
                Err(e) => warn!(unit = %config.name, error = %e, "could not persist block report"),
            }
            info!(unit = %config.name, reason = %report.reason, "generation blocked");
            return PoimandresResult::Blocked {
                report,
                session_id: reply.session_id,
            };
        }
    }

    debug!(unit = %config.name, chars = reply.text.len(), "generation complete");
    PoimandresResult::Success {
        output: output_from_text(config, reply.text),
        session_id: reply.session_id,
    }
}
