//! `{name}` interpolation for goal strings.
//!
//! `{{` and `}}` produce literal braces. String values are inserted verbatim; other JSON values
//! are inserted as compact JSON. A placeholder with no binding is an error.

use serde_json::{Map, Value};

use crate::context::value_to_text;
use crate::error::TemplateError;

/// Replaces every `{name}` in `template` with `vars[name]`.
pub fn render(template: &str, vars: &Map<String, Value>) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match c {
            '{' => {
                if matches!(chars.peek(), Some((_, '{'))) {
                    chars.next();
                    out.push('{');
                    continue;
                }
                let mut name = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '}' {
                        closed = true;
                        break;
                    }
                    name.push(c);
                }
                if !closed {
                    return Err(TemplateError::Unclosed(pos));
                }
                let value = vars
                    .get(&name)
                    .ok_or_else(|| TemplateError::MissingVariable(name.clone()))?;
                out.push_str(&value_to_text(value));
            }
            '}' => {
                if matches!(chars.peek(), Some((_, '}'))) {
                    chars.next();
                    out.push('}');
                } else {
                    return Err(TemplateError::StrayBrace(pos));
                }
            }
            other => out.push(other),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vars(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    #[test]
    fn substitutes_strings_and_values() {
        let out = render(
            "Build {project} with {n} files: {cfg}",
            &vars(json!({"project": "app", "n": 3, "cfg": {"fast": true}})),
        )
        .unwrap();
        assert_eq!(out, r#"Build app with 3 files: {"fast":true}"#);
    }

    /// **Scenario**: Doubled braces are literal and not treated as placeholders.
    #[test]
    fn escaped_braces() {
        let out = render("{{literal}} and {x}}}", &vars(json!({"x": "v"}))).unwrap();
        assert_eq!(out, "{literal} and v}");
    }

    #[test]
    fn missing_variable_is_an_error() {
        let err = render("Use {topic}", &Map::new()).unwrap_err();
        assert_eq!(err, TemplateError::MissingVariable("topic".into()));
    }

    #[test]
    fn unbalanced_braces_are_errors() {
        assert_eq!(render("oops {open", &Map::new()), Err(TemplateError::Unclosed(5)));
        assert_eq!(render("a } b", &Map::new()), Err(TemplateError::StrayBrace(2)));
    }
}
