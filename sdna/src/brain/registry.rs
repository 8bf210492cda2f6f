//! Named brains and the directory-keyed knowledge provider.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SdnaError;

use super::{Brain, BrainConfig, Cognition, KnowledgeProvider, NeuronScorer};

/// Brains by name, sharing one scorer.
pub struct BrainRegistry {
    scorer: Arc<dyn NeuronScorer>,
    max_parallel: usize,
    brains: HashMap<String, Brain>,
}

impl BrainRegistry {
    pub fn new(scorer: Arc<dyn NeuronScorer>) -> Self {
        Self {
            scorer,
            max_parallel: sdna_config::DEFAULT_BRAIN_MAX_PARALLEL,
            brains: HashMap::new(),
        }
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    /// Registers (or replaces) a brain under `config.name`.
    pub fn register(&mut self, config: BrainConfig) -> &mut Brain {
        let brain = Brain::new(config, self.scorer.clone()).with_max_parallel(self.max_parallel);
        match self.brains.entry(brain.config().name.clone()) {
            Entry::Occupied(mut slot) => {
                slot.insert(brain);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(brain),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Brain> {
        self.brains.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Brain> {
        self.brains.get_mut(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.brains.keys().cloned().collect();
        names.sort();
        names
    }

    /// Runs `query` against the brain named `name`.
    pub async fn think(&mut self, name: &str, query: &str, max_neurons: usize) -> Result<Cognition, SdnaError> {
        let brain = self
            .brains
            .get_mut(name)
            .ok_or_else(|| SdnaError::Knowledge(format!("no brain named '{}'", name)))?;
        brain.think(query, max_neurons).await
    }
}

/// [`KnowledgeProvider`] that builds a fresh [`Brain`] over the queried directory.
pub struct BrainKnowledge {
    scorer: Arc<dyn NeuronScorer>,
    chunk_size: usize,
    max_parallel: usize,
    extensions: Vec<String>,
}

impl BrainKnowledge {
    pub fn new(scorer: Arc<dyn NeuronScorer>) -> Self {
        Self {
            scorer,
            chunk_size: sdna_config::DEFAULT_BRAIN_CHUNK_SIZE,
            max_parallel: sdna_config::DEFAULT_BRAIN_MAX_PARALLEL,
            extensions: [".md", ".txt", ".py"].into_iter().map(String::from).collect(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn with_extensions<I, T>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }
}

#[async_trait]
impl KnowledgeProvider for BrainKnowledge {
    async fn query(&self, directory: &Path, query: &str, max_neurons: usize) -> Result<Cognition, SdnaError> {
        let config = BrainConfig::new("ariadne_brain", directory)
            .with_chunk_size(self.chunk_size)
            .with_extensions(self.extensions.iter().cloned());
        let mut brain = Brain::new(config, self.scorer.clone()).with_max_parallel(self.max_parallel);
        brain.think(query, max_neurons).await
    }
}
