//! Workflow definitions as data: threads, units, flows, and loops from YAML or JSON.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::SdnaError;

/// Parses a definition from YAML text.
pub fn from_yaml_str<T: DeserializeOwned>(text: &str) -> Result<T, SdnaError> {
    serde_yaml::from_str(text).map_err(|e| SdnaError::Config(format!("invalid YAML definition: {}", e)))
}

/// Parses a definition from JSON text.
pub fn from_json_str<T: DeserializeOwned>(text: &str) -> Result<T, SdnaError> {
    serde_json::from_str(text).map_err(|e| SdnaError::Config(format!("invalid JSON definition: {}", e)))
}

/// Loads a definition; `.json` files are JSON, everything else is YAML.
pub async fn load_definition<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T, SdnaError> {
    let path = path.as_ref();
    let text = tokio::fs::read_to_string(path).await.map_err(|e| SdnaError::Io {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    match path.extension().and_then(|e| e.to_str()) {
        Some("json") => from_json_str(&text),
        _ => from_yaml_str(&text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ariadne::{inject_literal, Element};
    use crate::sdnac::SdnaFlow;

    const FLOW: &str = r#"
name: pipeline
units:
  - name: draft
    ariadne:
      name: prep
      elements:
        - kind: literal
          inject_as: tone
          value: terse
        - kind: human
          prompt: "Topic?"
          input_key: topic
    config:
      name: draft
      goal: "Write about {topic} in a {tone} tone"
      max_turns: 2
"#;

    /// **Scenario**: A flow round-trips from YAML with defaults filled in.
    #[tokio::test]
    async fn loads_flow_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flow.yaml");
        std::fs::write(&path, FLOW).unwrap();

        let flow: SdnaFlow = load_definition(&path).await.unwrap();
        assert_eq!(flow.units.len(), 1);
        let unit = &flow.units[0];
        assert_eq!(unit.ariadne.elements[0], inject_literal("tone", "terse"));
        assert!(matches!(unit.ariadne.elements[1], Element::Human { .. }));
        assert_eq!(unit.config.max_turns, Some(2));
        assert_eq!(unit.config.inject_context_as, "project_context");

        let json = serde_json::to_string(&flow).unwrap();
        assert_eq!(from_json_str::<SdnaFlow>(&json).unwrap(), flow);
    }

    const FOUR_STAGE: &str = r#"
name: review
challenger:
  name: challenger
  ariadne:
    name: challenger_prep
  config:
    name: challenger
    goal: "Question {topic}"
generator:
  name: generator
  ariadne:
    name: generator_prep
    elements:
      - kind: literal
        inject_as: style
        value: concise
  config:
    name: generator
    goal: "Answer {challenge}"
    output_tags: [deliverable]
gate:
  name: gate
  ariadne:
    name: gate_prep
  config:
    name: gate
    goal: "gate goal"
    max_turns: 1
ovp:
  name: ovp
  ariadne:
    name: ovp_prep
  config:
    name: ovp
    goal: "Review {deliverable}"
"#;

    /// **Scenario**: A four-stage loop loads from YAML with every stage and the default budget.
    #[test]
    fn four_stage_loop_from_yaml_gets_default_budget() {
        let agent: crate::duo::DuoAgentV2 = from_yaml_str(FOUR_STAGE).unwrap();
        assert_eq!(agent.name, "review");
        assert_eq!(agent.max_iterations, crate::duo::DEFAULT_V2_MAX_ITERATIONS);
        assert_eq!(agent.challenger.config.goal, "Question {topic}");
        assert_eq!(agent.generator.ariadne.elements, vec![inject_literal("style", "concise")]);
        assert_eq!(agent.generator.config.output_tags, vec!["deliverable".to_string()]);
        assert_eq!(agent.gate.config.goal, "gate goal");
        assert_eq!(agent.gate.config.max_turns, Some(1));
        assert_eq!(agent.ovp.ariadne.name, "ovp_prep");
        assert!(agent.ovp.ariadne.elements.is_empty());
        assert_eq!(agent.ovp.config.inject_context_as, "project_context");
    }

    #[tokio::test]
    async fn bad_definitions_are_config_errors() {
        assert!(matches!(from_yaml_str::<SdnaFlow>("units: 3"), Err(SdnaError::Config(_))));
        assert!(matches!(
            load_definition::<SdnaFlow>("/no/such/flow.yaml").await,
            Err(SdnaError::Io { .. })
        ));
    }
}
