//! Graph scheduler: state graph with explicit edges, conditional routing, and jumps.
//!
//! Build with [`StateGraph`], compile to [`CompiledStateGraph`], run with `invoke` or
//! `invoke_from`. Nodes implement [`Node`] and return [`Next`]. The workflow layers compile
//! themselves onto this engine (see the `compile` module).

mod compile_error;
mod compiled;
mod conditional;
mod logging;
mod name_node;
mod next;
mod node;
mod state_graph;
mod visualization;

pub use compile_error::CompilationError;
pub use compiled::{CompiledStateGraph, PartialRun, DEFAULT_RECURSION_LIMIT};
pub use conditional::{ConditionalRouter, ConditionalRouterFn, NextEntry};
pub use logging::{
    log_graph_complete, log_graph_error, log_graph_start, log_node_complete, log_node_start,
    log_node_state,
};
pub use name_node::NameNode;
pub use next::Next;
pub use node::Node;
pub use state_graph::{StateGraph, END, START};
pub use visualization::{generate_dot, generate_text};
