//! Error types for element, generation, and engine failures.
//!
//! None of these escape a component's top-level `execute`: threads, units, flows, and loops
//! convert them into a tagged [`Outcome`](crate::Outcome). They are returned directly only by
//! lower-level helpers (templating, dovetail mapping, model clients, stores, loaders).

use thiserror::Error;

/// Failure while applying an element, calling the model, or running a graph.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SdnaError {
    /// File element could not read its file.
    #[error("{path}: {message}")]
    Io { path: String, message: String },

    /// Function element names a module that is not registered.
    #[error("no module named '{0}'")]
    ModuleNotFound(String),

    /// Function element names a function the module does not provide.
    #[error("module '{module}' has no function '{function}'")]
    FunctionNotFound { module: String, function: String },

    /// The invoked function returned an error.
    #[error("function failed: {0}")]
    FunctionFailed(String),

    /// Goal template could not be resolved.
    #[error(transparent)]
    Template(#[from] TemplateError),

    /// Dovetail mapping is missing expected outputs or required inputs.
    #[error("{0}")]
    Dovetail(String),

    /// Knowledge retrieval failed.
    #[error("knowledge retrieval failed: {0}")]
    Knowledge(String),

    /// Model-call collaborator failed or is not configured.
    #[error("{0}")]
    Transport(String),

    /// Invalid configuration detected before any external call.
    #[error("configuration error: {0}")]
    Config(String),

    /// Graph scheduler failure (empty graph, unknown node, recursion limit).
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
}

/// Failure while interpolating `{name}` placeholders.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("missing required variable in goal template: '{0}'")]
    MissingVariable(String),

    /// `{` without a matching `}`.
    #[error("unclosed '{{' at byte {0} in goal template")]
    Unclosed(usize),

    /// `}` that is neither escaped nor closing a placeholder.
    #[error("single '}}' encountered at byte {0} in goal template")]
    StrayBrace(usize),
}
