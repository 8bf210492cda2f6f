//! Several brains queried together and one synthesized answer across them.
//!
//! [`HierarchicalBrain`] asks every sub-brain in parallel (bounded by `max_parallel`), keeps a
//! failed sub-brain as an error entry instead of failing the query, and then asks the
//! synthesis model to merge the relevant answers. [`ProjectBrain`] builds the sub-brains
//! from a project's directory layout.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Local;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::SdnaError;
use crate::model::{complete, ModelClient, ModelOptions};

use super::{Brain, BrainConfig, Cognition, ModelScorer, NeuronScorer};

/// Synthesis when no sub-brain found anything relevant.
pub const NO_RELEVANT_DOMAINS: &str = "No relevant information found across any knowledge domains.";

pub const DEFAULT_SYNTHESIS_MODEL: &str = "sonnet";
pub const DEFAULT_COGNITION_MODEL: &str = "haiku";
pub const DEFAULT_MAX_NEURONS_PER_BRAIN: usize = 3;
pub const DEFAULT_HIERARCHY_MAX_PARALLEL: usize = 5;

fn default_synthesis_model() -> String {
    DEFAULT_SYNTHESIS_MODEL.to_string()
}

fn default_cognition_model() -> String {
    DEFAULT_COGNITION_MODEL.to_string()
}

fn default_max_neurons_per_brain() -> usize {
    DEFAULT_MAX_NEURONS_PER_BRAIN
}

fn default_max_parallel() -> usize {
    DEFAULT_HIERARCHY_MAX_PARALLEL
}

/// Sub-brains plus the models and limits used to query them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalBrainConfig {
    pub name: String,
    pub sub_brains: Vec<SubBrain>,
    #[serde(default = "default_synthesis_model")]
    pub synthesis_model: String,
    /// Model the sub-brains score and instruct with.
    #[serde(default = "default_cognition_model")]
    pub cognition_model: String,
    #[serde(default = "default_max_neurons_per_brain")]
    pub max_neurons_per_brain: usize,
    /// Sub-brains queried at once.
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
}

/// Where one sub-brain reads its neurons from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubBrain {
    pub name: String,
    pub directory: PathBuf,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub extensions: Option<Vec<String>>,
}

impl SubBrain {
    pub fn new(name: impl Into<String>, directory: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            directory: directory.into(),
            description: String::new(),
            extensions: None,
        }
    }

    fn to_config(&self) -> BrainConfig {
        let config = BrainConfig::new(self.name.clone(), self.directory.clone())
            .with_description(self.description.clone());
        match &self.extensions {
            Some(extensions) => config.with_extensions(extensions.iter().cloned()),
            None => config,
        }
    }
}

impl HierarchicalBrainConfig {
    pub fn new(name: impl Into<String>, sub_brains: Vec<SubBrain>) -> Self {
        Self {
            name: name.into(),
            sub_brains,
            synthesis_model: default_synthesis_model(),
            cognition_model: default_cognition_model(),
            max_neurons_per_brain: DEFAULT_MAX_NEURONS_PER_BRAIN,
            max_parallel: DEFAULT_HIERARCHY_MAX_PARALLEL,
        }
    }
}

/// Answers from every sub-brain and the merged answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalResult {
    pub query: String,
    /// Sub-brain name to its answer; a failed sub-brain carries `Error querying brain: ...`.
    pub sub_results: BTreeMap<String, Cognition>,
    pub synthesis: String,
    pub timestamp: String,
}

/// Brains over several directories, merged by a synthesis model.
pub struct HierarchicalBrain {
    config: HierarchicalBrainConfig,
    model: Arc<dyn ModelClient>,
    brains: Vec<Brain>,
}

impl HierarchicalBrain {
    /// Sub-brains score through `model` with the cognition model; synthesis uses the same client.
    pub fn new(config: HierarchicalBrainConfig, model: Arc<dyn ModelClient>) -> Self {
        let scorer: Arc<dyn NeuronScorer> =
            Arc::new(ModelScorer::new(model.clone(), config.cognition_model.clone()));
        Self::with_scorer(config, model, scorer)
    }

    pub fn with_scorer(
        config: HierarchicalBrainConfig,
        model: Arc<dyn ModelClient>,
        scorer: Arc<dyn NeuronScorer>,
    ) -> Self {
        let brains = config
            .sub_brains
            .iter()
            .map(|sub| Brain::new(sub.to_config(), scorer.clone()))
            .collect();
        Self {
            config,
            model,
            brains,
        }
    }

    pub fn config(&self) -> &HierarchicalBrainConfig {
        &self.config
    }

    /// Loads every sub-brain; returns neuron counts by name. Fails on the first missing directory.
    pub fn load(&mut self) -> Result<BTreeMap<String, usize>, SdnaError> {
        let mut counts = BTreeMap::new();
        for brain in &mut self.brains {
            let count = brain.load_neurons()?;
            counts.insert(brain.config().name.clone(), count);
        }
        Ok(counts)
    }

    /// Queries every sub-brain, then synthesizes the relevant answers.
    pub async fn query(&mut self, query: &str) -> HierarchicalResult {
        let max_neurons = self.config.max_neurons_per_brain;
        let owned = query.to_string();
        let brains = std::mem::take(&mut self.brains);
        let mut answered: Vec<(usize, Brain, Result<Cognition, SdnaError>)> =
            stream::iter(brains.into_iter().enumerate())
                .map(|(i, mut brain)| {
                    let query = owned.clone();
                    async move {
                        let result = brain.think(&query, max_neurons).await;
                        (i, brain, result)
                    }
                })
                .buffer_unordered(self.config.max_parallel.max(1))
                .collect()
                .await;
        answered.sort_by_key(|(i, _, _)| *i);

        let mut ordered = Vec::with_capacity(answered.len());
        let mut sub_results = BTreeMap::new();
        for (_, brain, result) in answered {
            let name = brain.config().name.clone();
            let cognition = result.unwrap_or_else(|e| {
                warn!(hierarchy = %self.config.name, brain = %name, error = %e, "sub-brain failed");
                Cognition {
                    query: query.to_string(),
                    instructions: format!("Error querying brain: {}", e),
                    neurons: Vec::new(),
                }
            });
            ordered.push((name.clone(), cognition.clone()));
            sub_results.insert(name, cognition);
            self.brains.push(brain);
        }

        let synthesis = self.synthesize(query, &ordered).await;
        HierarchicalResult {
            query: query.to_string(),
            sub_results,
            synthesis,
            timestamp: Local::now().to_rfc3339(),
        }
    }

    /// Merges the sub-brain answers that found relevant neurons, in sub-brain order.
    async fn synthesize(&self, query: &str, answers: &[(String, Cognition)]) -> String {
        let parts: Vec<String> = answers
            .iter()
            .filter(|(_, c)| !c.neurons.is_empty())
            .map(|(name, c)| format!("## From {}\n\n{}", name, c.instructions))
            .collect();
        if parts.is_empty() {
            return NO_RELEVANT_DOMAINS.to_string();
        }
        debug!(hierarchy = %self.config.name, domains = parts.len(), "synthesizing");

        let prompt = format!(
            "You are synthesizing knowledge from multiple specialized domains to answer a query.\n\n\
             <query>{query}</query>\n\n\
             <domain_knowledge>\n{knowledge}\n</domain_knowledge>\n\n\
             Synthesize this information into a coherent, actionable response.\n\
             - Identify common themes across domains\n\
             - Resolve any contradictions\n\
             - Provide a unified answer that draws on all relevant sources\n\
             - Be specific and practical",
            knowledge = parts.join("\n\n---\n\n"),
        );
        let options = ModelOptions {
            max_turns: Some(1),
            model: Some(self.config.synthesis_model.clone()),
            ..Default::default()
        };
        match complete(self.model.as_ref(), &prompt, &options).await {
            Ok(reply) => reply.text,
            Err(e) => format!("Synthesis error: {}", e),
        }
    }
}

/// Module name and the directories tried for it, first existing one wins.
pub type ModuleLayout = Vec<(String, Vec<String>)>;

/// Source, tests, docs, and config directories of a typical project.
pub fn default_modules() -> ModuleLayout {
    [
        ("source", &["src", "lib", "app", "pkg"][..]),
        ("tests", &["tests", "test", "spec"][..]),
        ("docs", &["docs", "documentation", "doc"][..]),
        ("config", &["config", "settings", "."][..]),
    ]
    .into_iter()
    .map(|(name, dirs)| (name.to_string(), dirs.iter().map(|d| d.to_string()).collect()))
    .collect()
}

/// A hierarchical brain over one project, one sub-brain per discovered module.
pub struct ProjectBrain {
    root: PathBuf,
    name: String,
    modules: ModuleLayout,
    extensions: Vec<String>,
    model: Arc<dyn ModelClient>,
    scorer: Option<Arc<dyn NeuronScorer>>,
    brain: Option<HierarchicalBrain>,
}

impl ProjectBrain {
    pub fn new(root: impl Into<PathBuf>, model: Arc<dyn ModelClient>) -> Self {
        Self {
            root: root.into(),
            name: "project".to_string(),
            modules: default_modules(),
            extensions: [".py", ".ts", ".js", ".md", ".yaml", ".json"]
                .into_iter()
                .map(String::from)
                .collect(),
            model,
            scorer: None,
            brain: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_modules(mut self, modules: ModuleLayout) -> Self {
        self.modules = modules;
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

    /// Scores with `scorer` instead of a model-backed scorer.
    pub fn with_scorer(mut self, scorer: Arc<dyn NeuronScorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// One sub-brain per module with an existing directory; the whole root when none matches.
    pub fn discover(&self) -> HierarchicalBrainConfig {
        let mut subs: Vec<SubBrain> = self
            .modules
            .iter()
            .filter_map(|(module, dirs)| {
                dirs.iter()
                    .map(|d| self.root.join(d))
                    .find(|path| path.is_dir())
                    .map(|path| self.sub_brain(module, path, format!("{} module of {}", module, self.name)))
            })
            .collect();
        if subs.is_empty() {
            subs.push(self.sub_brain("all", self.root.clone(), format!("All files in {}", self.name)));
        }
        HierarchicalBrainConfig::new(self.name.clone(), subs)
    }

    fn sub_brain(&self, module: &str, directory: PathBuf, description: String) -> SubBrain {
        SubBrain {
            name: format!("{}_{}", self.name, module),
            directory,
            description,
            extensions: Some(self.extensions.clone()),
        }
    }

    /// Discovers modules, builds the hierarchical brain, and loads it.
    pub fn discover_and_load(&mut self) -> Result<BTreeMap<String, usize>, SdnaError> {
        let config = self.discover();
        let mut brain = match &self.scorer {
            Some(scorer) => HierarchicalBrain::with_scorer(config, self.model.clone(), scorer.clone()),
            None => HierarchicalBrain::new(config, self.model.clone()),
        };
        let counts = brain.load()?;
        self.brain = Some(brain);
        Ok(counts)
    }

    pub async fn query(&mut self, query: &str) -> Result<HierarchicalResult, SdnaError> {
        if self.brain.is_none() {
            self.discover_and_load()?;
        }
        match self.brain.as_mut() {
            Some(brain) => Ok(brain.query(query).await),
            None => Err(SdnaError::Knowledge(format!("project brain '{}' not loaded", self.name))),
        }
    }

    /// Synthesized context for a task description.
    pub async fn context(&mut self, task: &str) -> Result<String, SdnaError> {
        Ok(self.query(task).await?.synthesis)
    }
}

/// Synthesized context for `task` from the project at `root`, with the default module layout.
pub async fn get_project_context(
    root: impl AsRef<Path>,
    task: &str,
    model: Arc<dyn ModelClient>,
) -> Result<String, SdnaError> {
    let mut project = ProjectBrain::new(root.as_ref(), model);
    project.context(task).await
}
