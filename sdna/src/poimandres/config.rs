//! `HermesConfig`: everything one generation step needs besides the context.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{SdnaError, TemplateError};
use crate::model::ModelOptions;
use crate::template;

/// File a session hook writes the current session id to.
pub const BRACE_FILE: &str = "/tmp/current_claude_session_id";

fn default_inject_context_as() -> String {
    "project_context".to_string()
}

fn default_allowed_tools() -> Vec<String> {
    ["Read", "Write", "Edit", "Bash", "Glob", "Grep"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Goal template, knowledge injection, and model options for one generation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HermesConfig {
    /// Identifier; block reports are stored under it.
    pub name: String,
    /// Prompt template with `{var}` placeholders.
    pub goal: String,
    pub variable_inputs: Map<String, Value>,

    pub brain_query: Option<String>,
    pub brain_project_root: Option<PathBuf>,
    #[serde(default = "default_inject_context_as")]
    pub inject_context_as: String,
    /// Read the session to resume from [`BRACE_FILE`].
    pub auto_brace: bool,

    /// Tags pulled out of the final text into the step's output.
    pub output_tags: Vec<String>,

    #[serde(default = "default_allowed_tools")]
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub system_prompt: Option<String>,
    pub permission_mode: Option<String>,
    pub resume: Option<String>,
    pub fork_session: bool,
    pub continue_conversation: bool,
    pub max_turns: Option<u32>,
    pub max_budget_usd: Option<f64>,
    pub max_thinking_tokens: Option<u32>,
    pub model: Option<String>,
    pub fallback_model: Option<String>,
    pub cwd: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub add_dirs: Vec<PathBuf>,
    pub hooks: Option<BTreeMap<String, Vec<Value>>>,
    pub mcp_servers: Map<String, Value>,
    pub extra_args: Map<String, Value>,
}

impl Default for HermesConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            goal: String::new(),
            variable_inputs: Map::new(),
            brain_query: None,
            brain_project_root: None,
            inject_context_as: default_inject_context_as(),
            auto_brace: false,
            output_tags: Vec::new(),
            allowed_tools: default_allowed_tools(),
            disallowed_tools: Vec::new(),
            system_prompt: None,
            permission_mode: None,
            resume: None,
            fork_session: false,
            continue_conversation: false,
            max_turns: None,
            max_budget_usd: None,
            max_thinking_tokens: None,
            model: None,
            fallback_model: None,
            cwd: None,
            env: BTreeMap::new(),
            add_dirs: Vec::new(),
            hooks: None,
            mcp_servers: Map::new(),
            extra_args: Map::new(),
        }
    }
}

impl HermesConfig {
    pub fn new(name: impl Into<String>, goal: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            goal: goal.into(),
            ..Self::default()
        }
    }

    pub fn with_variable(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variable_inputs.insert(key.into(), value.into());
        self
    }

    pub fn with_output_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.output_tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_brain(mut self, project_root: impl Into<PathBuf>, query: impl Into<String>) -> Self {
        self.brain_project_root = Some(project_root.into());
        self.brain_query = Some(query.into());
        self
    }

    /// Goal with `variable_inputs` overlaid by `inputs`.
    pub fn resolve_goal(&self, inputs: &Map<String, Value>) -> Result<String, TemplateError> {
        self.resolve_goal_with(&Map::new(), inputs)
    }

    /// Goal with `defaults`, then `variable_inputs`, then `inputs`. When all three are empty
    /// the goal is returned untouched, braces included.
    pub fn resolve_goal_with(
        &self,
        defaults: &Map<String, Value>,
        inputs: &Map<String, Value>,
    ) -> Result<String, TemplateError> {
        if defaults.is_empty() && self.variable_inputs.is_empty() && inputs.is_empty() {
            return Ok(self.goal.clone());
        }
        let mut vars = defaults.clone();
        for layer in [&self.variable_inputs, inputs] {
            for (k, v) in layer {
                vars.insert(k.clone(), v.clone());
            }
        }
        template::render(&self.goal, &vars)
    }

    /// Session to resume, reading [`BRACE_FILE`] when `auto_brace` is set.
    pub fn resolve_session_id(&self) -> Result<Option<String>, SdnaError> {
        self.resolve_session_id_from(Path::new(BRACE_FILE))
    }

    /// As [`resolve_session_id`](Self::resolve_session_id) with an explicit brace file.
    pub fn resolve_session_id_from(&self, brace_file: &Path) -> Result<Option<String>, SdnaError> {
        let mut sid = self.resume.clone();
        if self.auto_brace {
            if let Ok(content) = std::fs::read_to_string(brace_file) {
                sid = Some(content.trim().to_string());
            }
        }
        let sid = sid.filter(|s| !s.is_empty());
        if self.fork_session && sid.is_none() {
            return Err(SdnaError::Config(
                "fork_session requires resume or auto_brace with a valid session file".into(),
            ));
        }
        Ok(sid)
    }

    /// Model options with the session resolved.
    pub fn to_options(&self) -> Result<ModelOptions, SdnaError> {
        Ok(self.options_with_session(self.resolve_session_id()?))
    }

    pub(crate) fn options_with_session(&self, resume: Option<String>) -> ModelOptions {
        ModelOptions {
            allowed_tools: self.allowed_tools.clone(),
            disallowed_tools: self.disallowed_tools.clone(),
            system_prompt: self.system_prompt.clone(),
            permission_mode: self.permission_mode.clone(),
            resume,
            fork_session: self.fork_session,
            continue_conversation: self.continue_conversation,
            max_turns: self.max_turns,
            max_budget_usd: self.max_budget_usd,
            max_thinking_tokens: self.max_thinking_tokens,
            model: self.model.clone(),
            fallback_model: self.fallback_model.clone(),
            cwd: self.cwd.clone(),
            env: self.env.clone(),
            add_dirs: self.add_dirs.clone(),
            hooks: self.hooks.clone(),
            mcp_servers: self.mcp_servers.clone(),
            extra_args: self.extra_args.clone(),
        }
    }
}
