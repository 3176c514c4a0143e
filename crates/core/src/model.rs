//! ModelClient trait — the abstraction over chat-completion backends.
//!
//! A ModelClient knows how to send a transcript to an LLM and hand back the
//! response as an incremental token stream. The agent loop consumes the
//! stream without knowing which backend produced it — pure polymorphism.

use crate::error::ModelError;
use crate::message::Message;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Configuration for a model request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelRequest {
    /// The model to use (e.g., "deepseek-chat", "gpt-4o")
    pub model: String,

    /// The transcript messages
    pub messages: Vec<Message>,

    /// Temperature (0.0 = deterministic, 1.0 = creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

fn default_temperature() -> f32 {
    0.7
}

impl ModelRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            temperature: default_temperature(),
            max_tokens: None,
        }
    }
}

/// A receiver of incremental text fragments from a model response.
///
/// Each item is either a text delta or a fatal stream error. Dropping the
/// receiver cancels the upstream request — implementations must stop
/// producing once their sender is closed.
pub type TokenStream = tokio::sync::mpsc::Receiver<std::result::Result<String, ModelError>>;

/// The core ModelClient trait.
///
/// Every backend (OpenAI-compatible, Anthropic, local) implements this.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "deepseek", "mock").
    fn name(&self) -> &str;

    /// Send a request and receive the response as a token stream.
    async fn stream(&self, request: ModelRequest) -> std::result::Result<TokenStream, ModelError>;
}
