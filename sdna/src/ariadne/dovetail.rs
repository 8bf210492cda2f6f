//! Dovetail: check that an upstream stage produced what it promised, then map its outputs
//! onto the input names the next stage expects.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::Context;
use crate::error::SdnaError;

fn default_required() -> bool {
    true
}

/// Where one downstream input comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DovetailInput {
    /// Dot path into the context; numeric segments index arrays.
    pub source_key: String,
    #[serde(default = "default_required")]
    pub required: bool,
    /// Used when the source is missing and the input is optional.
    #[serde(default)]
    pub default: Value,
}

impl DovetailInput {
    pub fn required(source_key: impl Into<String>) -> Self {
        Self {
            source_key: source_key.into(),
            required: true,
            default: Value::Null,
        }
    }

    pub fn optional(source_key: impl Into<String>, default: impl Into<Value>) -> Self {
        Self {
            source_key: source_key.into(),
            required: false,
            default: default.into(),
        }
    }
}

/// Output validation plus input mapping between two stages.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Dovetail {
    pub name: String,
    /// Dot paths that must be present and non-null.
    #[serde(default)]
    pub expected_outputs: Vec<String>,
    /// New key -> source.
    #[serde(default)]
    pub input_map: BTreeMap<String, DovetailInput>,
}

/// Follows `path` through objects (by key) and arrays (by numeric index). Null counts as absent.
pub(crate) fn lookup_path<'a>(context: &'a Context, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = context.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    (!current.is_null()).then_some(current)
}

impl Dovetail {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn expect(mut self, path: impl Into<String>) -> Self {
        self.expected_outputs.push(path.into());
        self
    }

    pub fn map_input(mut self, key: impl Into<String>, input: DovetailInput) -> Self {
        self.input_map.insert(key.into(), input);
        self
    }

    /// Fails listing every expected output that is missing.
    pub fn validate_outputs(&self, context: &Context) -> Result<(), SdnaError> {
        let missing: Vec<&str> = self
            .expected_outputs
            .iter()
            .filter(|path| lookup_path(context, path).is_none())
            .map(String::as_str)
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(SdnaError::Dovetail(format!(
                "Dovetail '{}' missing outputs: [{}]",
                self.name,
                missing.join(", ")
            )))
        }
    }

    /// Resolved `(key, value)` pairs for every mapped input.
    pub fn prepare_inputs(&self, context: &Context) -> Result<Vec<(String, Value)>, SdnaError> {
        let mut prepared = Vec::with_capacity(self.input_map.len());
        for (key, input) in &self.input_map {
            let value = match lookup_path(context, &input.source_key) {
                Some(v) => v.clone(),
                None if input.required => {
                    return Err(SdnaError::Dovetail(format!(
                        "Required input '{}' not found",
                        input.source_key
                    )))
                }
                None => input.default.clone(),
            };
            prepared.push((key.clone(), value));
        }
        Ok(prepared)
    }

    /// Validate, then prepare.
    pub fn resolve(&self, context: &Context) -> Result<Vec<(String, Value)>, SdnaError> {
        self.validate_outputs(context)?;
        self.prepare_inputs(context)
    }
}
