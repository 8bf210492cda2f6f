//! Model-call collaborator: prompt + options in, stream of message events out.
//!
//! The transport itself (provider SDK, CLI bridge, HTTP) lives behind [`ModelClient`]; the
//! generation step only consumes the stream until it ends, keeping the last text and the last
//! session id it saw.

mod mock;

pub use mock::{MockModel, MockReply};

use std::collections::BTreeMap;
use std::path::PathBuf;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SdnaError;

/// Execution options for one model call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelOptions {
    pub allowed_tools: Vec<String>,
    pub disallowed_tools: Vec<String>,
    pub system_prompt: Option<String>,
    pub permission_mode: Option<String>,
    /// Session to resume.
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
    /// Hook callbacks by event name, as opaque descriptors for the transport.
    pub hooks: Option<BTreeMap<String, Vec<Value>>>,
    pub mcp_servers: Map<String, Value>,
    pub extra_args: Map<String, Value>,
}

/// One message from the model stream. Either field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEvent {
    pub session_id: Option<String>,
    pub text: Option<String>,
}

impl ModelEvent {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            session_id: None,
            text: Some(text.into()),
        }
    }

    pub fn session(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            text: None,
        }
    }
}

pub type ModelStream = BoxStream<'static, Result<ModelEvent, SdnaError>>;

/// Opaque async model call.
///
/// Failures to start the call and failures mid-stream are both [`SdnaError::Transport`]
/// (or another `SdnaError`); the generation step classifies either as an error outcome.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn query(&self, prompt: &str, options: &ModelOptions) -> Result<ModelStream, SdnaError>;
}

/// Final text and session id of a completed call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelReply {
    /// Text of the last event that carried text.
    pub text: String,
    pub session_id: Option<String>,
}

/// Runs `query` and drains the stream into a [`ModelReply`].
pub async fn complete(
    client: &dyn ModelClient,
    prompt: &str,
    options: &ModelOptions,
) -> Result<ModelReply, SdnaError> {
    let mut stream = client.query(prompt, options).await?;
    let mut reply = ModelReply::default();
    while let Some(event) = stream.next().await {
        let event = event?;
        if let Some(sid) = event.session_id {
            reply.session_id = Some(sid);
        }
        if let Some(text) = event.text {
            reply.text = text;
        }
    }
    Ok(reply)
}

/// Default client of a bare [`Runtime`](crate::Runtime): every call fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnconfiguredModel;

#[async_trait]
impl ModelClient for UnconfiguredModel {
    async fn query(&self, _prompt: &str, _options: &ModelOptions) -> Result<ModelStream, SdnaError> {
        Err(SdnaError::Transport("model client not configured".into()))
    }
}
