//! Name node: a pass-through node that only has a name.

use async_trait::async_trait;
use std::fmt::Debug;

use crate::error::SdnaError;

use super::Next;
use super::Node;

/// State passes through unchanged; `run` returns `Next::Continue`.
///
/// Stands in for an empty thread or flow so the compiled graph still has a node to run.
pub struct NameNode {
    name: String,
}

impl NameNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl<S> Node<S> for NameNode
where
    S: Clone + Send + Sync + Debug + 'static,
{
    fn id(&self) -> &str {
        &self.name
    }

    async fn run(&self, state: S) -> Result<(S, Next), SdnaError> {
        Ok((state, Next::Continue))
    }
}
