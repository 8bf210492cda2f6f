//! Per-neuron model calls: relevance scoring and instruction extraction.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::SdnaError;
use crate::model::{complete, ModelClient, ModelOptions};

use super::Neuron;

const SCORE_EXCERPT_CHARS: usize = 2000;
const INSTRUCT_EXCERPT_CHARS: usize = 3000;

/// Scores a neuron against a query and extracts instructions from it.
#[async_trait]
pub trait NeuronScorer: Send + Sync {
    /// Relevance in `[0, 1]` plus a short reasoning.
    async fn score(&self, neuron: &Neuron, query: &str) -> Result<(f64, String), SdnaError>;

    /// Instructions relevant to `query` drawn from `neuron`.
    async fn instruct(&self, neuron: &Neuron, query: &str) -> Result<String, SdnaError>;
}

/// [`NeuronScorer`] backed by a model client, one single-turn, tool-less call per neuron.
pub struct ModelScorer {
    model: Arc<dyn ModelClient>,
    model_name: String,
}

impl ModelScorer {
    pub fn new(model: Arc<dyn ModelClient>, model_name: impl Into<String>) -> Self {
        Self {
            model,
            model_name: model_name.into(),
        }
    }

    fn options(&self) -> ModelOptions {
        ModelOptions {
            max_turns: Some(1),
            model: Some(self.model_name.clone()),
            ..Default::default()
        }
    }
}

fn excerpt(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((byte, _)) => &content[..byte],
        None => content,
    }
}

/// Parses `{"score": .., "reasoning": ..}`, tolerating a ``` fence around the JSON.
pub(crate) fn parse_score(response: &str) -> Result<(f64, String), SdnaError> {
    let mut content = response.trim();
    if content.starts_with("```") {
        content = content.split("```").nth(1).unwrap_or_default();
        content = content.strip_prefix("json").unwrap_or(content);
    }
    let data: Value = serde_json::from_str(content.trim())
        .map_err(|e| SdnaError::Knowledge(format!("invalid relevance response: {}", e)))?;
    let score = data.get("score").and_then(Value::as_f64).unwrap_or(0.0);
    let reasoning = data
        .get("reasoning")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    Ok((score.clamp(0.0, 1.0), reasoning))
}

#[async_trait]
impl NeuronScorer for ModelScorer {
    async fn score(&self, neuron: &Neuron, query: &str) -> Result<(f64, String), SdnaError> {
        let prompt = format!(
            "You are evaluating if this document is relevant to a query.\n\n\
             <document name=\"{name}\">\n{content}\n</document>\n\n\
             <query>{query}</query>\n\n\
             Respond with JSON only, no other text:\n\
             {{\"relevant\": true, \"score\": 0.85, \"reasoning\": \"brief explanation\"}}",
            name = neuron.name,
            content = excerpt(&neuron.content, SCORE_EXCERPT_CHARS),
        );
        let reply = complete(self.model.as_ref(), &prompt, &self.options()).await?;
        parse_score(&reply.text)
    }

    async fn instruct(&self, neuron: &Neuron, query: &str) -> Result<String, SdnaError> {
        let prompt = format!(
            "Based on this document, provide instructions relevant to the query.\n\n\
             <document name=\"{name}\">\n{content}\n</document>\n\n\
             <query>{query}</query>\n\n\
             <relevance_reasoning>{reasoning}</relevance_reasoning>\n\n\
             Provide clear, actionable instructions based on the document content. Be specific and practical.",
            name = neuron.name,
            content = excerpt(&neuron.content, INSTRUCT_EXCERPT_CHARS),
            reasoning = neuron.reasoning,
        );
        let reply = complete(self.model.as_ref(), &prompt, &self.options()).await?;
        Ok(reply.text)
    }
}
