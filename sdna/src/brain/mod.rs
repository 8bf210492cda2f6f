//! Knowledge retrieval: score documents ("neurons") against a query and synthesize instructions.
//!
//! The engine only sees [`KnowledgeProvider`]. [`BrainKnowledge`] is the full implementation:
//! it loads neurons from a directory, scores them concurrently through a [`NeuronScorer`], and
//! asks for per-neuron instructions on the most relevant ones. [`HierarchicalBrain`] and
//! [`ProjectBrain`] merge answers from several brains. [`StaticKnowledge`] is a fixed
//! stand-in for tests.

mod hierarchy;
mod neuron;
mod registry;
mod scorer;

pub use hierarchy::{
    default_modules, get_project_context, HierarchicalBrain, HierarchicalBrainConfig, HierarchicalResult,
    ModuleLayout, ProjectBrain, SubBrain, NO_RELEVANT_DOMAINS,
};
pub use neuron::{Brain, BrainConfig, Neuron, NO_RELEVANT_KNOWLEDGE};
pub use registry::{BrainKnowledge, BrainRegistry};
pub use scorer::{ModelScorer, NeuronScorer};

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SdnaError;

/// Default cap on neurons that contribute to one answer.
pub const DEFAULT_MAX_NEURONS: usize = 5;

/// A neuron that contributed to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeuronRef {
    pub name: String,
    pub relevance: f64,
}

/// Synthesized answer to one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cognition {
    pub query: String,
    pub instructions: String,
    /// Contributing neurons, most relevant first.
    pub neurons: Vec<NeuronRef>,
}

/// `query(directory, text) -> instructions + contributing neurons`.
#[async_trait]
pub trait KnowledgeProvider: Send + Sync {
    async fn query(
        &self,
        directory: &Path,
        query: &str,
        max_neurons: usize,
    ) -> Result<Cognition, SdnaError>;
}

/// Default provider of a bare [`Runtime`](crate::Runtime): every query fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoKnowledge;

#[async_trait]
impl KnowledgeProvider for NoKnowledge {
    async fn query(&self, _: &Path, _: &str, _: usize) -> Result<Cognition, SdnaError> {
        Err(SdnaError::Knowledge("knowledge provider not configured".into()))
    }
}

/// Fixed answer for every query; counts calls.
#[derive(Debug)]
pub struct StaticKnowledge {
    instructions: String,
    neurons: Vec<NeuronRef>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl StaticKnowledge {
    pub fn new(instructions: impl Into<String>) -> Self {
        Self {
            instructions: instructions.into(),
            neurons: Vec::new(),
            failure: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Every query fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::new("")
        }
    }

    /// Reports `name` as a contributing neuron (builder).
    pub fn with_neuron(mut self, name: impl Into<String>, relevance: f64) -> Self {
        self.neurons.push(NeuronRef {
            name: name.into(),
            relevance,
        });
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl KnowledgeProvider for StaticKnowledge {
    async fn query(&self, _directory: &Path, query: &str, max_neurons: usize) -> Result<Cognition, SdnaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(SdnaError::Knowledge(message.clone()));
        }
        Ok(Cognition {
            query: query.to_string(),
            instructions: self.instructions.clone(),
            neurons: self.neurons.iter().take(max_neurons).cloned().collect(),
        })
    }
}
