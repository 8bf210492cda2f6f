//! Mock model for tests and examples.
//!
//! Replies come from scripts: a fallback script plus optional rules keyed by a substring of the
//! prompt, so one runtime can serve several units that each get their own replies. A script
//! returns its replies in order and then keeps repeating the last one.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;

use crate::error::SdnaError;

use super::{ModelClient, ModelEvent, ModelOptions, ModelStream};

/// One scripted reply.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Stream a single text event.
    Text(String),
    /// Fail the call with a transport error.
    Fail(String),
    /// Stream these events as-is.
    Events(Vec<ModelEvent>),
}

impl MockReply {
    pub fn text(text: impl Into<String>) -> Self {
        MockReply::Text(text.into())
    }

    pub fn fail(message: impl Into<String>) -> Self {
        MockReply::Fail(message.into())
    }
}

#[derive(Debug)]
struct Script {
    replies: Vec<MockReply>,
    next: AtomicUsize,
}

impl Script {
    fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            next: AtomicUsize::new(0),
        }
    }

    fn next_reply(&self) -> MockReply {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        match self.replies.len() {
            0 => MockReply::Text(String::new()),
            len => self.replies[n.min(len - 1)].clone(),
        }
    }
}

/// Mock model: scripted replies, call counting, recorded prompts and options.
///
/// **Interaction**: Implements `ModelClient`; install with `Runtime::with_model`.
#[derive(Debug)]
pub struct MockModel {
    fallback: Script,
    /// (prompt substring, script); first matching rule wins.
    rules: Vec<(String, Script)>,
    session_id: Option<String>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
    options: Mutex<Vec<ModelOptions>>,
}

impl MockModel {
    /// Always replies with `text`.
    pub fn new(text: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::Text(text.into())])
    }

    /// Replies from `replies` in order, then repeats the last.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        Self {
            fallback: Script::new(replies),
            rules: Vec::new(),
            session_id: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
            options: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `message`.
    pub fn failing(message: impl Into<String>) -> Self {
        Self::scripted(vec![MockReply::Fail(message.into())])
    }

    /// Prompts containing `needle` are answered from `replies` instead of the fallback (builder).
    pub fn on_prompt(mut self, needle: impl Into<String>, replies: Vec<MockReply>) -> Self {
        self.rules.push((needle.into(), Script::new(replies)));
        self
    }

    /// Emit a session-id event before each reply (builder).
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Total calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Calls whose prompt contained `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.prompts().iter().filter(|p| p.contains(needle)).count()
    }

    /// Prompts received, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Options of the most recent call.
    pub fn last_options(&self) -> Option<ModelOptions> {
        self.options.lock().ok().and_then(|o| o.last().cloned())
    }
}

#[async_trait]
impl ModelClient for MockModel {
    async fn query(&self, prompt: &str, options: &ModelOptions) -> Result<ModelStream, SdnaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut p) = self.prompts.lock() {
            p.push(prompt.to_string());
        }
        if let Ok(mut o) = self.options.lock() {
            o.push(options.clone());
        }

        let script = self
            .rules
            .iter()
            .find(|(needle, _)| prompt.contains(needle.as_str()))
            .map(|(_, s)| s)
            .unwrap_or(&self.fallback);

        let mut events = Vec::new();
        if let Some(sid) = &self.session_id {
            events.push(ModelEvent::session(sid.clone()));
        }
        match script.next_reply() {
            MockReply::Fail(message) => return Err(SdnaError::Transport(message)),
            MockReply::Text(text) => events.push(ModelEvent::text(text)),
            MockReply::Events(list) => events.extend(list),
        }
        Ok(stream::iter(events.into_iter().map(Ok)).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::complete;

    /// **Scenario**: Scripted replies are returned in order, then the last one repeats.
    #[tokio::test]
    async fn scripted_replies_then_repeat_last() {
        let mock = MockModel::scripted(vec![MockReply::text("one"), MockReply::text("two")]);
        let opts = ModelOptions::default();
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(complete(&mock, "p", &opts).await.unwrap().text);
        }
        assert_eq!(seen, vec!["one", "two", "two"]);
        assert_eq!(mock.calls(), 3);
    }

    /// **Scenario**: Prompt rules route to their own scripts; counts are tracked per needle.
    #[tokio::test]
    async fn prompt_rules_and_counts() {
        let mock = MockModel::new("fallback")
            .on_prompt("[review]", vec![MockReply::text("reviewed")])
            .with_session_id("sess-9");
        let opts = ModelOptions::default();
        let a = complete(&mock, "please [review] this", &opts).await.unwrap();
        let b = complete(&mock, "generate", &opts).await.unwrap();
        assert_eq!(a.text, "reviewed");
        assert_eq!(a.session_id.as_deref(), Some("sess-9"));
        assert_eq!(b.text, "fallback");
        assert_eq!(mock.calls_matching("[review]"), 1);
        assert_eq!(mock.prompts().len(), 2);
    }

    #[tokio::test]
    async fn failing_mock_returns_transport_error() {
        let mock = MockModel::failing("rate limited");
        let err = complete(&mock, "p", &ModelOptions::default()).await.unwrap_err();
        assert_eq!(err, SdnaError::Transport("rate limited".into()));
        assert_eq!(mock.calls(), 1);
    }
}
