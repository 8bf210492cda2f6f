//! Context: the key/value state threaded through a workflow execution.
//!
//! Keys are strings, values are arbitrary JSON. Later writes overwrite earlier ones; nothing is
//! removed implicitly. Every component takes `Context` by value, so a failed or suspended stage
//! never mutates the caller's copy.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Accumulated workflow state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String value at `key`; `None` when absent or not a string.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Text at `key` for stage outputs: strings verbatim, other values as JSON, absent as "".
    pub fn text_of(&self, key: &str) -> String {
        self.0.get(key).map(value_to_text).unwrap_or_default()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Overlays `other` on top of `self`, key by key.
    pub fn merge(&mut self, other: Map<String, Value>) {
        for (k, v) in other {
            self.0.insert(k, v);
        }
    }

    /// Truthiness of the value at `key`; absent is false. See [`is_truthy`].
    pub fn is_truthy(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(is_truthy)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for Context {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Truthiness of a JSON value: null, `false`, zero, and empty string/array/object are false.
///
/// A non-empty string is true even when it reads `"false"`; approval flags parsed from model
/// text are converted to booleans before they reach the context.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Renders a value as prompt text: strings verbatim, everything else as compact JSON.
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// **Scenario**: Later inserts overwrite earlier ones; merge overlays key by key.
    #[test]
    fn insert_and_merge_overwrite_by_key() {
        let mut ctx = Context::new().with("a", 1).with("b", "x");
        ctx.insert("a", 2);
        let mut overlay = Map::new();
        overlay.insert("b".into(), json!("y"));
        overlay.insert("c".into(), json!(true));
        ctx.merge(overlay);
        assert_eq!(ctx.get("a"), Some(&json!(2)));
        assert_eq!(ctx.get_str("b"), Some("y"));
        assert!(ctx.is_truthy("c"));
        assert_eq!(ctx.len(), 3);
    }

    /// **Scenario**: Truthiness follows the falsy set: null, false, 0, "", [], {}.
    #[test]
    fn truthiness() {
        for v in [json!(null), json!(false), json!(0), json!(""), json!([]), json!({})] {
            assert!(!is_truthy(&v), "{v} should be falsy");
        }
        for v in [json!(true), json!(1), json!("false"), json!([0]), json!({"a": 0})] {
            assert!(is_truthy(&v), "{v} should be truthy");
        }
        assert!(!Context::new().is_truthy("missing"));
    }

    /// **Scenario**: Context serializes as a plain JSON object.
    #[test]
    fn serializes_transparently() {
        let ctx = Context::new().with("k", "v");
        assert_eq!(serde_json::to_value(&ctx).unwrap(), json!({"k": "v"}));
    }

    #[test]
    fn text_of_renders_non_strings_as_json() {
        let ctx = Context::new().with("s", "plain").with("n", 3).with("o", json!({"a": 1}));
        assert_eq!(ctx.text_of("s"), "plain");
        assert_eq!(ctx.text_of("n"), "3");
        assert_eq!(ctx.text_of("o"), r#"{"a":1}"#);
        assert_eq!(ctx.text_of("missing"), "");
    }
}
