//! Context elements: one atomic operation on the context each.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::brain::DEFAULT_MAX_NEURONS;
use crate::context::{value_to_text, Context};
use crate::error::SdnaError;
use crate::runtime::Runtime;

use super::dovetail::Dovetail;

/// Prefix marking a function argument or knowledge query as a context lookup.
pub const CONTEXT_REF_PREFIX: char = '$';

fn default_max_neurons() -> usize {
    DEFAULT_MAX_NEURONS
}

/// One step of a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Element {
    /// `context[inject_as] = value`.
    Literal { inject_as: String, value: Value },
    /// `context[inject_as] = contents of path`.
    File { inject_as: String, path: PathBuf },
    /// `context[inject_as] = functions[module][func](args)`; `$key` args read the context.
    Function {
        inject_as: String,
        module: String,
        func: String,
        #[serde(default)]
        args: Map<String, Value>,
    },
    /// `context[inject_as] = $env_var`, else `default`, else null.
    Env {
        inject_as: String,
        env_var: String,
        #[serde(default)]
        default: Option<String>,
    },
    /// `context[inject_as]` = synthesized instructions, `context[inject_as + "_neurons"]` = sources.
    Knowledge {
        inject_as: String,
        directory: PathBuf,
        /// Literal query, or `$key` to read it from the context.
        query: String,
        #[serde(default = "default_max_neurons")]
        max_neurons: usize,
    },
    /// Suspends the thread until a human answers `prompt` into `input_key`.
    Human {
        prompt: String,
        input_key: String,
        #[serde(default)]
        choices: Option<Vec<String>>,
    },
    Dovetail(Dovetail),
}

/// What applying an element does to the context.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Writes to commit, in order.
    Update(Vec<(String, Value)>),
    Suspend {
        prompt: String,
        input_key: String,
        choices: Option<Vec<String>>,
    },
}

/// `$key` -> the context value (or the literal when `key` is absent); anything else as-is.
fn resolve_arg(value: &Value, context: &Context) -> Value {
    match value.as_str().and_then(|s| s.strip_prefix(CONTEXT_REF_PREFIX)) {
        Some(key) => context.get(key).cloned().unwrap_or_else(|| value.clone()),
        None => value.clone(),
    }
}

fn resolve_query(query: &str, context: &Context) -> String {
    match query.strip_prefix(CONTEXT_REF_PREFIX) {
        Some(key) => context.get(key).map(value_to_text).unwrap_or_default(),
        None => query.to_string(),
    }
}

impl Element {
    /// Short label for logs and graph node names.
    pub fn kind(&self) -> &'static str {
        match self {
            Element::Literal { .. } => "literal",
            Element::File { .. } => "file",
            Element::Function { .. } => "function",
            Element::Env { .. } => "env",
            Element::Knowledge { .. } => "knowledge",
            Element::Human { .. } => "human",
            Element::Dovetail(_) => "dovetail",
        }
    }

    /// Computes this element's effect without touching `context`. Only the human gate suspends.
    pub async fn apply(&self, context: &Context, runtime: &Runtime) -> Result<Effect, SdnaError> {
        let writes = match self {
            Element::Literal { inject_as, value } => vec![(inject_as.clone(), value.clone())],
            Element::File { inject_as, path } => {
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| SdnaError::Io {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    })?;
                vec![(inject_as.clone(), Value::String(content))]
            }
            Element::Function {
                inject_as,
                module,
                func,
                args,
            } => {
                let bound: Map<String, Value> = args
                    .iter()
                    .map(|(k, v)| (k.clone(), resolve_arg(v, context)))
                    .collect();
                let result = runtime.functions.call(module, func, &bound)?;
                vec![(inject_as.clone(), result)]
            }
            Element::Env {
                inject_as,
                env_var,
                default,
            } => {
                let value = std::env::var(env_var)
                    .ok()
                    .or_else(|| default.clone())
                    .map_or(Value::Null, Value::String);
                vec![(inject_as.clone(), value)]
            }
            Element::Knowledge {
                inject_as,
                directory,
                query,
                max_neurons,
            } => {
                let query = resolve_query(query, context);
                let cognition = runtime.knowledge.query(directory, &query, *max_neurons).await?;
                let neurons: Vec<Value> = cognition
                    .neurons
                    .iter()
                    .map(|n| json!({"name": n.name, "relevance": n.relevance}))
                    .collect();
                vec![
                    (inject_as.clone(), Value::String(cognition.instructions)),
                    (format!("{}_neurons", inject_as), Value::Array(neurons)),
                ]
            }
            Element::Human {
                prompt,
                input_key,
                choices,
            } => {
                return Ok(Effect::Suspend {
                    prompt: prompt.clone(),
                    input_key: input_key.clone(),
                    choices: choices.clone(),
                })
            }
            Element::Dovetail(dovetail) => dovetail.resolve(context)?,
        };
        Ok(Effect::Update(writes))
    }
}

pub fn inject_literal(inject_as: impl Into<String>, value: impl Into<Value>) -> Element {
    Element::Literal {
        inject_as: inject_as.into(),
        value: value.into(),
    }
}

pub fn inject_file(inject_as: impl Into<String>, path: impl Into<PathBuf>) -> Element {
    Element::File {
        inject_as: inject_as.into(),
        path: path.into(),
    }
}

pub fn inject_func(
    inject_as: impl Into<String>,
    module: impl Into<String>,
    func: impl Into<String>,
    args: Map<String, Value>,
) -> Element {
    Element::Function {
        inject_as: inject_as.into(),
        module: module.into(),
        func: func.into(),
        args,
    }
}

pub fn inject_env(inject_as: impl Into<String>, env_var: impl Into<String>, default: Option<&str>) -> Element {
    Element::Env {
        inject_as: inject_as.into(),
        env_var: env_var.into(),
        default: default.map(String::from),
    }
}

pub fn inject_brain(
    inject_as: impl Into<String>,
    directory: impl Into<PathBuf>,
    query: impl Into<String>,
) -> Element {
    Element::Knowledge {
        inject_as: inject_as.into(),
        directory: directory.into(),
        query: query.into(),
        max_neurons: DEFAULT_MAX_NEURONS,
    }
}

pub fn human(prompt: impl Into<String>, input_key: impl Into<String>, choices: Option<Vec<String>>) -> Element {
    Element::Human {
        prompt: prompt.into(),
        input_key: input_key.into(),
        choices,
    }
}

pub fn dovetail(dovetail: Dovetail) -> Element {
    Element::Dovetail(dovetail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brain::StaticKnowledge;
    use crate::functions::FunctionRegistry;
    use std::sync::Arc;

    fn update(effect: Effect) -> Vec<(String, Value)> {
        match effect {
            Effect::Update(writes) => writes,
            other => panic!("expected update, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn literal_and_env() {
        let rt = Runtime::new();
        let ctx = Context::new();
        assert_eq!(
            update(inject_literal("k", 3).apply(&ctx, &rt).await.unwrap()),
            vec![("k".to_string(), json!(3))]
        );
        let env = inject_env("home", "SDNA_ELEMENT_TEST_UNSET_VAR", Some("fallback"));
        assert_eq!(
            update(env.apply(&ctx, &rt).await.unwrap()),
            vec![("home".to_string(), json!("fallback"))]
        );
        let bare = inject_env("home", "SDNA_ELEMENT_TEST_UNSET_VAR", None);
        assert_eq!(update(bare.apply(&ctx, &rt).await.unwrap())[0].1, Value::Null);
    }

    #[tokio::test]
    async fn file_reads_or_fails_with_io() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "# notes").unwrap();
        let rt = Runtime::new();
        let ctx = Context::new();
        assert_eq!(
            update(inject_file("notes", &path).apply(&ctx, &rt).await.unwrap())[0].1,
            json!("# notes")
        );
        let err = inject_file("x", dir.path().join("missing.md"))
            .apply(&ctx, &rt)
            .await
            .unwrap_err();
        assert!(matches!(err, SdnaError::Io { .. }));
    }

    /// **Scenario**: `$key` arguments read the context; unknown keys pass through literally.
    #[tokio::test]
    async fn function_resolves_context_args() {
        let rt = Runtime::new().with_functions(FunctionRegistry::new().with("text", "echo", |args| {
            Ok(Value::Object(args.clone()))
        }));
        let ctx = Context::new().with("name", "ana");
        let mut args = Map::new();
        args.insert("who".into(), json!("$name"));
        args.insert("missing".into(), json!("$nope"));
        args.insert("plain".into(), json!(7));
        let writes = update(inject_func("out", "text", "echo", args).apply(&ctx, &rt).await.unwrap());
        assert_eq!(writes[0].1, json!({"who": "ana", "missing": "$nope", "plain": 7}));
    }

    #[tokio::test]
    async fn knowledge_sets_instructions_and_neurons() {
        let rt = Runtime::new().with_knowledge(Arc::new(
            StaticKnowledge::new("follow the guide").with_neuron("guide.md", 0.9),
        ));
        let ctx = Context::new().with("question", "how?");
        let writes = update(inject_brain("advice", "/docs", "$question").apply(&ctx, &rt).await.unwrap());
        assert_eq!(writes[0], ("advice".to_string(), json!("follow the guide")));
        assert_eq!(
            writes[1],
            ("advice_neurons".to_string(), json!([{"name": "guide.md", "relevance": 0.9}]))
        );
    }

    #[tokio::test]
    async fn human_suspends() {
        let effect = human("Pick one", "choice", Some(vec!["a".into(), "b".into()]))
            .apply(&Context::new(), &Runtime::new())
            .await
            .unwrap();
        assert!(matches!(effect, Effect::Suspend { ref input_key, .. } if input_key == "choice"));
    }

    #[test]
    fn elements_round_trip_through_serde() {
        let el: Element = serde_json::from_value(json!({
            "kind": "knowledge", "inject_as": "k", "directory": "/d", "query": "q"
        }))
        .unwrap();
        assert_eq!(el, inject_brain("k", "/d", "q"));
        assert_eq!(el.kind(), "knowledge");
    }
}
