//! Integration tests: knowledge retrieval through a model-backed scorer.


use std::sync::Arc;

use sdna::{
    ariadne, inject_brain, BrainConfig, BrainKnowledge, BrainRegistry, Context, MockModel,
    MockReply, ModelScorer, Runtime,
};

const SCORE_PROMPT: &str = "You are evaluating if this document is relevant";

fn knowledge_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("errors.md"), "Use thiserror enums per concern.").unwrap();
    std::fs::write(dir.path().join("recipes.txt"), "Whisk eggs.").unwrap();
    std::fs::write(dir.path().join("notes.json"), "{}").unwrap();
    std::fs::create_dir(dir.path().join(".git")).unwrap();
    std::fs::write(dir.path().join(".git").join("config.md"), "hidden").unwrap();
    dir
}

fn scorer_model() -> Arc<MockModel> {
    Arc::new(
        MockModel::new("fallback")
            .on_prompt("Based on this document", vec![MockReply::text("Define one error enum per module.")])
            .on_prompt(
                "<document name=\"errors.md\">",
                vec![MockReply::text("```json\n{\"score\": 0.9, \"reasoning\": \"error handling\"}\n```")],
            )
            .on_prompt(SCORE_PROMPT, vec![MockReply::text(r#"{"score": 0.1, "reasoning": "off topic"}"#)]),
    )
}

/// **Scenario**: The knowledge element scores every neuron and keeps only the relevant ones.
#[tokio::test]
async fn knowledge_element_synthesizes_relevant_neurons() {
    let dir = knowledge_dir();
    let model = scorer_model();
    let knowledge = BrainKnowledge::new(Arc::new(ModelScorer::new(model.clone(), "haiku"))).with_max_parallel(2);
    let rt = Runtime::new().with_knowledge(Arc::new(knowledge));

    let out = ariadne("k", vec![inject_brain("guide", dir.path(), "how should errors look?")])
        .execute(Context::new(), &rt)
        .await;
    assert!(out.is_success(), "{:?}", out);
    let guide = out.context().get_str("guide").unwrap();
    assert_eq!(guide, "## From errors.md\n\nDefine one error enum per module.");
    let neurons = out.context().get("guide_neurons").unwrap().as_array().unwrap();
    assert_eq!(neurons.len(), 1);
    assert_eq!(neurons[0]["name"], "errors.md");

    assert_eq!(model.calls_matching(SCORE_PROMPT), 2);
    assert_eq!(model.calls_matching("Based on this document"), 1);
    assert!(model.prompts().iter().all(|p| !p.contains("hidden")));
    assert_eq!(model.last_options().unwrap().max_turns, Some(1));
}

#[tokio::test]
async fn missing_directory_is_an_element_error() {
    let rt = Runtime::new().with_knowledge(Arc::new(BrainKnowledge::new(Arc::new(ModelScorer::new(
        scorer_model(),
        "haiku",
    )))));
    let out = ariadne("k", vec![inject_brain("guide", "/definitely/not/here", "q")])
        .execute(Context::new(), &rt)
        .await;
    assert!(out.error_message().unwrap().contains("does not exist"));
}

#[tokio::test]
async fn registry_thinks_by_name() {
    let dir = knowledge_dir();
    let mut registry = BrainRegistry::new(Arc::new(ModelScorer::new(scorer_model(), "haiku")));
    registry.register(BrainConfig::new("project", dir.path()));
    assert_eq!(registry.names(), vec!["project".to_string()]);

    let cognition = registry.think("project", "errors?", 5).await.unwrap();
    assert_eq!(cognition.neurons.len(), 1);
    assert!(registry.think("other", "errors?", 5).await.is_err());
}
