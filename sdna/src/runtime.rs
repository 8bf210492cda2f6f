//! Runtime: the collaborators a workflow execution talks to.
//!
//! Created by the caller at workflow start and passed by reference to every `execute`.
//! Cloning is cheap; all collaborators are shared.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use sdna_config::Settings;

use crate::brain::{BrainKnowledge, KnowledgeProvider, ModelScorer, NoKnowledge};
use crate::functions::FunctionRegistry;
use crate::model::{ModelClient, UnconfiguredModel};
use crate::report::{BlockReportStore, FileBlockReportStore, InMemoryBlockReportStore};

/// Model client, knowledge provider, function registry, block-report store, and template defaults.
#[derive(Clone)]
pub struct Runtime {
    pub model: Arc<dyn ModelClient>,
    pub knowledge: Arc<dyn KnowledgeProvider>,
    pub functions: Arc<FunctionRegistry>,
    pub reports: Arc<dyn BlockReportStore>,
    /// Lowest-precedence variables for goal templating.
    pub template_defaults: Map<String, Value>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("functions", &self.functions)
            .field("template_defaults", &self.template_defaults)
            .finish_non_exhaustive()
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Runtime {
    /// Unconfigured model and knowledge, no functions, in-memory reports.
    pub fn new() -> Self {
        Self {
            model: Arc::new(UnconfiguredModel),
            knowledge: Arc::new(NoKnowledge),
            functions: Arc::new(FunctionRegistry::new()),
            reports: Arc::new(InMemoryBlockReportStore::new()),
            template_defaults: Map::new(),
        }
    }

    /// File report store and brain parameters from `settings`; knowledge scored through `model`.
    pub fn from_settings(settings: &Settings, model: Arc<dyn ModelClient>) -> Self {
        let scorer = ModelScorer::new(model.clone(), settings.brain_model.clone());
        let knowledge = BrainKnowledge::new(Arc::new(scorer))
            .with_chunk_size(settings.brain_chunk_size)
            .with_max_parallel(settings.brain_max_parallel);
        Self::new()
            .with_model(model)
            .with_knowledge(Arc::new(knowledge))
            .with_report_store(Arc::new(FileBlockReportStore::new(
                settings.block_reports_dir.clone(),
            )))
    }

    pub fn with_model(mut self, model: Arc<dyn ModelClient>) -> Self {
        self.model = model;
        self
    }

    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeProvider>) -> Self {
        self.knowledge = knowledge;
        self
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    pub fn with_report_store(mut self, reports: Arc<dyn BlockReportStore>) -> Self {
        self.reports = reports;
        self
    }

    pub fn with_template_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.template_defaults = defaults;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{complete, MockModel, ModelOptions};
    use std::path::Path;

    #[tokio::test]
    async fn bare_runtime_fails_model_and_knowledge() {
        let rt = Runtime::new();
        assert!(complete(rt.model.as_ref(), "p", &ModelOptions::default()).await.is_err());
        assert!(rt.knowledge.query(Path::new("."), "q", 5).await.is_err());
        assert!(rt.reports.recent(10).await.unwrap().is_empty());
    }

    /// **Scenario**: from_settings wires the file store at the configured directory.
    #[tokio::test]
    async fn from_settings_uses_report_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings {
            block_reports_dir: dir.path().join("reports"),
            ..Settings::default()
        };
        let rt = Runtime::from_settings(&settings, Arc::new(MockModel::new("ok")));
        let path = rt
            .reports
            .append("unit", &crate::report::BlockedReport::new("raw"))
            .await
            .unwrap();
        assert!(path.starts_with(dir.path().join("reports").to_string_lossy().as_ref()));
    }
}
