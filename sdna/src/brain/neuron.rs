//! Brain: a directory of neurons, scored and distilled per query.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use walkdir::{DirEntry, WalkDir};

use crate::error::SdnaError;

use super::{Cognition, NeuronRef, NeuronScorer};

/// Answer when no neuron clears the relevance threshold.
pub const NO_RELEVANT_KNOWLEDGE: &str = "No relevant knowledge found for this query.";

/// Neurons at or below this relevance never contribute.
const RELEVANCE_THRESHOLD: f64 = 0.5;

/// Where neurons come from and how they are cut.
#[derive(Debug, Clone, PartialEq)]
pub struct BrainConfig {
    pub name: String,
    pub directory: PathBuf,
    pub description: String,
    /// Files longer than this many characters become `name:chunkN` neurons. Never zero.
    chunk_size: usize,
    /// File extensions to load, with the leading dot.
    pub extensions: Vec<String>,
}

impl BrainConfig {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            description: String::new(),
            chunk_size: sdna_config::DEFAULT_BRAIN_CHUNK_SIZE,
            extensions: [".md", ".txt", ".py", ".json", ".yaml"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
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

/// One knowledge source: a file or a chunk of one.
#[derive(Debug, Clone, PartialEq)]
pub struct Neuron {
    pub path: String,
    pub name: String,
    pub content: String,
    pub relevance: f64,
    pub reasoning: String,
    pub instructions: String,
}

impl Neuron {
    pub fn new(path: impl Into<String>, name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            content: content.into(),
            relevance: 0.0,
            reasoning: String::new(),
            instructions: String::new(),
        }
    }

    fn to_ref(&self) -> NeuronRef {
        NeuronRef {
            name: self.name.clone(),
            relevance: self.relevance,
        }
    }
}

fn is_hidden_or_cache(entry: &DirEntry) -> bool {
    entry.depth() > 0 && {
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.') || name == "__pycache__"
    }
}

fn chunk(path: &str, name: &str, content: &str, chunk_size: usize) -> Vec<Neuron> {
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(chunk_size.max(1))
        .enumerate()
        .map(|(i, part)| {
            Neuron::new(
                format!("{}:chunk{}", path, i + 1),
                format!("{}:chunk{}", name, i + 1),
                part.iter().collect::<String>(),
            )
        })
        .collect()
}

/// Neurons from one directory plus the scorer that judges them.
pub struct Brain {
    config: BrainConfig,
    scorer: Arc<dyn NeuronScorer>,
    max_parallel: usize,
    neurons: Vec<Neuron>,
    loaded: bool,
}

impl Brain {
    pub fn new(config: BrainConfig, scorer: Arc<dyn NeuronScorer>) -> Self {
        Self {
            config,
            scorer,
            max_parallel: sdna_config::DEFAULT_BRAIN_MAX_PARALLEL,
            neurons: Vec::new(),
            loaded: false,
        }
    }

    /// Upper bound on concurrent scorer calls (builder).
    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel.max(1);
        self
    }

    pub fn config(&self) -> &BrainConfig {
        &self.config
    }

    pub fn neurons(&self) -> &[Neuron] {
        &self.neurons
    }

    /// (Re)loads neurons: recursive, matching extensions, hidden entries and `__pycache__`
    /// skipped, oversized files chunked. Unreadable files are logged and skipped.
    pub fn load_neurons(&mut self) -> Result<usize, SdnaError> {
        let dir = &self.config.directory;
        if !dir.is_dir() {
            return Err(SdnaError::Knowledge(format!(
                "Brain directory does not exist: {}",
                dir.display()
            )));
        }

        let mut neurons = Vec::new();
        let walker = WalkDir::new(dir)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| !is_hidden_or_cache(e));
        for entry in walker.filter_map(Result::ok) {
            if !entry.file_type().is_file() {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !self.config.extensions.iter().any(|ext| file_name.ends_with(ext.as_str())) {
                continue;
            }
            let path = entry.path().to_string_lossy().into_owned();
            let content = match std::fs::read_to_string(entry.path()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "could not load neuron");
                    continue;
                }
            };
            let chunk_size = self.config.chunk_size();
            if content.chars().count() > chunk_size {
                neurons.extend(chunk(&path, &file_name, &content, chunk_size));
            } else {
                neurons.push(Neuron::new(path, file_name, content));
            }
        }

        tracing::debug!(brain = %self.config.name, count = neurons.len(), "neurons loaded");
        self.neurons = neurons;
        self.loaded = true;
        Ok(self.neurons.len())
    }

    /// Scores every neuron (bounded concurrency); returns the top `max_relevant` above the
    /// threshold, most relevant first. A failed score counts as 0.
    pub async fn cognize(&mut self, query: &str, max_relevant: usize) -> Result<Vec<Neuron>, SdnaError> {
        if !self.loaded {
            self.load_neurons()?;
        }
        if self.neurons.is_empty() {
            return Ok(Vec::new());
        }

        let query = query.to_string();
        let results: Vec<(usize, Result<(f64, String), SdnaError>)> =
            stream::iter(self.neurons.clone().into_iter().enumerate())
                .map(|(i, neuron)| {
                    let scorer = self.scorer.clone();
                    let query = query.clone();
                    async move { (i, scorer.score(&neuron, &query).await) }
                })
                .buffer_unordered(self.max_parallel)
                .collect()
                .await;

        for (i, result) in results {
            let neuron = &mut self.neurons[i];
            match result {
                Ok((relevance, reasoning)) => {
                    neuron.relevance = relevance;
                    neuron.reasoning = reasoning;
                }
                Err(e) => {
                    neuron.relevance = 0.0;
                    neuron.reasoning = format!("Error: {}", e);
                }
            }
        }

        let mut ranked = self.neurons.clone();
        ranked.sort_by(|a, b| b.relevance.total_cmp(&a.relevance));
        Ok(ranked
            .into_iter()
            .take(max_relevant)
            .filter(|n| n.relevance > RELEVANCE_THRESHOLD)
            .collect())
    }

    /// Fills `instructions` on each neuron; a failed call records `Error: ...` instead.
    pub async fn instruct(&self, neurons: &mut [Neuron], query: &str) {
        let query = query.to_string();
        let results: Vec<(usize, Result<String, SdnaError>)> =
            stream::iter(neurons.to_vec().into_iter().enumerate())
                .map(|(i, neuron)| {
                    let scorer = self.scorer.clone();
                    let query = query.clone();
                    async move { (i, scorer.instruct(&neuron, &query).await) }
                })
                .buffer_unordered(self.max_parallel)
                .collect()
                .await;
        for (i, result) in results {
            neurons[i].instructions = match result {
                Ok(text) => text,
                Err(e) => format!("Error: {}", e),
            };
        }
    }

    /// `## From <name>` sections separated by `---`; neurons without instructions are skipped.
    pub fn synthesize(neurons: &[Neuron]) -> String {
        neurons
            .iter()
            .filter(|n| !n.instructions.is_empty())
            .map(|n| format!("## From {}\n\n{}", n.name, n.instructions))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// Cognize, instruct, synthesize.
    pub async fn think(&mut self, query: &str, max_neurons: usize) -> Result<Cognition, SdnaError> {
        let mut relevant = self.cognize(query, max_neurons).await?;
        if relevant.is_empty() {
            return Ok(Cognition {
                query: query.to_string(),
                instructions: NO_RELEVANT_KNOWLEDGE.to_string(),
                neurons: Vec::new(),
            });
        }
        self.instruct(&mut relevant, query).await;
        Ok(Cognition {
            query: query.to_string(),
            instructions: Self::synthesize(&relevant),
            neurons: relevant.iter().map(Neuron::to_ref).collect(),
        })
    }
}
