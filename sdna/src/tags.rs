//! Tag extraction: pull `<name>...</name>` fields out of free-text model output.
//!
//! Matching is case-insensitive, spans newlines, and is non-greedy. Only the first occurrence of
//! each tag is returned; later occurrences are ignored.

use std::collections::BTreeMap;

use regex::RegexBuilder;

/// Tag name -> trimmed content of its first occurrence, or `None` when absent.
pub type ExtractedTags = BTreeMap<String, Option<String>>;

/// Expected value for one tag in [`match_tags`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagMatch {
    /// Tag must be present (any content).
    Any,
    /// Tag must be absent.
    Missing,
    /// Tag must equal this value, ignoring case.
    Equals(String),
}

/// First match of `<tag>(.*?)</tag>` for each name, trimmed.
///
/// ```
/// let tags = sdna::extract_tags("<a>1</a><b>2</b>", &["a", "b", "c"]);
/// assert_eq!(tags["a"].as_deref(), Some("1"));
/// assert_eq!(tags["c"], None);
/// ```
pub fn extract_tags(text: &str, tag_names: &[&str]) -> ExtractedTags {
    tag_names
        .iter()
        .map(|tag| (tag.to_string(), extract_tag(text, tag)))
        .collect()
}

/// First match for a single tag.
pub fn extract_tag(text: &str, tag: &str) -> Option<String> {
    let escaped = regex::escape(tag);
    let re = RegexBuilder::new(&format!("<{escaped}>(.*?)</{escaped}>"))
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .ok()?;
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

/// Tag exists (content may be empty).
pub fn has_tag(extracted: &ExtractedTags, tag: &str) -> bool {
    matches!(extracted.get(tag), Some(Some(_)))
}

/// Tag exists and equals `value`, ignoring case. Absence is a non-match.
pub fn tag_equals(extracted: &ExtractedTags, tag: &str, value: &str) -> bool {
    match extracted.get(tag) {
        Some(Some(actual)) => actual.to_lowercase() == value.to_lowercase(),
        _ => false,
    }
}

/// Tag exists and contains `substring`, ignoring case.
pub fn tag_contains(extracted: &ExtractedTags, tag: &str, substring: &str) -> bool {
    match extracted.get(tag) {
        Some(Some(actual)) => actual.to_lowercase().contains(&substring.to_lowercase()),
        _ => false,
    }
}

/// All conditions in `pattern` hold for `extracted`.
pub fn match_tags(extracted: &ExtractedTags, pattern: &[(&str, TagMatch)]) -> bool {
    pattern.iter().all(|(tag, expected)| match expected {
        TagMatch::Any => has_tag(extracted, tag),
        TagMatch::Missing => !has_tag(extracted, tag),
        TagMatch::Equals(value) => tag_equals(extracted, tag, value),
    })
}

/// Interprets tag content as a boolean: `"true"`/`"false"` in any case, otherwise `None`.
pub fn tag_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: Present tags are extracted, absent ones are None.
    #[test]
    fn extracts_present_and_absent_tags() {
        let tags = extract_tags("<a>1</a><b>2</b>", &["a", "b", "c"]);
        assert_eq!(tags.len(), 3);
        assert_eq!(tags["a"].as_deref(), Some("1"));
        assert_eq!(tags["b"].as_deref(), Some("2"));
        assert_eq!(tags["c"], None);
    }

    /// **Scenario**: Tag names match case-insensitively and content spans newlines.
    #[test]
    fn case_insensitive_and_multiline() {
        let text = "prefix <Deliverable>\nline one\nline two\n</DELIVERABLE> suffix";
        let tags = extract_tags(text, &["deliverable"]);
        assert_eq!(tags["deliverable"].as_deref(), Some("line one\nline two"));
    }

    /// **Scenario**: A repeated tag yields only its first occurrence.
    ///
    /// Known simplification: later occurrences are ignored rather than returning the last or
    /// all matches. This test pins the behavior so a change is deliberate.
    #[test]
    fn repeated_tag_returns_first_match_only() {
        let tags = extract_tags("<x>first</x> and <x>second</x>", &["x"]);
        assert_eq!(tags["x"].as_deref(), Some("first"));
    }

    /// **Scenario**: Hyphenated tag names and regex metacharacters are matched literally.
    #[test]
    fn tag_names_are_escaped() {
        let tags = extract_tags("<gate-passed> TRUE </gate-passed><a.b>z</a.b>", &["gate-passed", "a.b"]);
        assert!(tag_equals(&tags, "gate-passed", "true"));
        assert_eq!(tags["a.b"].as_deref(), Some("z"));
        assert_eq!(extract_tag("<axb>z</axb>", "a.b"), None);
    }

    #[test]
    fn predicates() {
        let tags = extract_tags("<status>Done Here</status><empty></empty>", &["status", "empty", "gone"]);
        assert!(has_tag(&tags, "status"));
        assert!(has_tag(&tags, "empty"));
        assert!(!has_tag(&tags, "gone"));
        assert!(tag_equals(&tags, "status", "done here"));
        assert!(!tag_equals(&tags, "gone", ""));
        assert!(tag_contains(&tags, "status", "DONE"));
        assert!(!tag_contains(&tags, "gone", "x"));
    }

    /// **Scenario**: match_tags combines Any, Missing, and Equals conditions.
    #[test]
    fn match_tags_patterns() {
        let tags = extract_tags("<completion-promise>DONE</completion-promise>", &["completion-promise", "error"]);
        assert!(match_tags(&tags, &[("completion-promise", TagMatch::Equals("done".into()))]));
        assert!(match_tags(&tags, &[("error", TagMatch::Missing)]));
        assert!(match_tags(&tags, &[("completion-promise", TagMatch::Any), ("error", TagMatch::Missing)]));
        assert!(!match_tags(&tags, &[("error", TagMatch::Any)]));
        assert!(!match_tags(&tags, &[("completion-promise", TagMatch::Missing)]));
    }

    #[test]
    fn tag_bool_parses_case_insensitively() {
        assert_eq!(tag_bool(" True "), Some(true));
        assert_eq!(tag_bool("FALSE"), Some(false));
        assert_eq!(tag_bool("yes"), None);
    }
}
