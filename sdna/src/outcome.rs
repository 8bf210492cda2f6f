//! Execution outcome shared by threads, units, and flows.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::report::BlockedReport;

/// What a human-input element is waiting for, and where to resume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInput {
    pub prompt: String,
    /// Context key that receives the answer.
    pub input_key: String,
    #[serde(default)]
    pub choices: Option<Vec<String>>,
    /// Index of the element after the human gate in the originating thread.
    pub resume_at: usize,
}

impl PendingInput {
    /// Context to resume with: `context` plus `value` at `input_key`.
    pub fn answer(&self, mut context: Context, value: impl Into<Value>) -> Context {
        context.insert(self.input_key.clone(), value);
        context
    }
}

/// Outcome tag, without payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    AwaitingInput,
    Blocked,
    Error,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::AwaitingInput => "awaiting_input",
            Status::Blocked => "blocked",
            Status::Error => "error",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of executing a thread, unit, or flow.
///
/// `context` is always the context accumulated up to the point the outcome was produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Success {
        context: Context,
    },
    AwaitingInput {
        context: Context,
        pending: PendingInput,
    },
    Blocked {
        context: Context,
        #[serde(default)]
        report: Option<BlockedReport>,
    },
    Error {
        context: Context,
        message: String,
    },
}

impl Outcome {
    pub fn status(&self) -> Status {
        match self {
            Outcome::Success { .. } => Status::Success,
            Outcome::AwaitingInput { .. } => Status::AwaitingInput,
            Outcome::Blocked { .. } => Status::Blocked,
            Outcome::Error { .. } => Status::Error,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    pub fn context(&self) -> &Context {
        match self {
            Outcome::Success { context }
            | Outcome::AwaitingInput { context, .. }
            | Outcome::Blocked { context, .. }
            | Outcome::Error { context, .. } => context,
        }
    }

    pub fn into_context(self) -> Context {
        match self {
            Outcome::Success { context }
            | Outcome::AwaitingInput { context, .. }
            | Outcome::Blocked { context, .. }
            | Outcome::Error { context, .. } => context,
        }
    }

    pub fn pending(&self) -> Option<&PendingInput> {
        match self {
            Outcome::AwaitingInput { pending, .. } => Some(pending),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Outcome::Error { message, .. } => Some(message),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&BlockedReport> {
        match self {
            Outcome::Blocked { report, .. } => report.as_ref(),
            _ => None,
        }
    }
}
