//! Lifecycle events — the agent's externally observable progress.
//!
//! `LifecycleEvent` is a closed tagged union; the encoders match on it
//! exhaustively so a new event kind can never be silently dropped.
//!
//! Event order for one run is strict:
//! - `thought`     — incremental reasoning fragment from the model
//! - `action`      — the agent is invoking a capability
//! - `observation` — the invocation's JSON-RPC result envelope
//! - `answer`      — the final user-facing text (at most one per run)
//! - `error`       — a fatal failure (always followed by `done`)
//! - `done`        — terminal; always the last event

use serde::{Deserialize, Serialize};

/// JSON-RPC 2.0 result envelope fed back to the model and to the client.
///
/// Exactly one of `result` / `error` is present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub jsonrpc: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<EnvelopeError>,

    /// Correlation token echoed from the invocation request.
    pub id: serde_json::Value,
}

/// The error half of an envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvelopeError {
    pub code: i64,
    pub message: String,
}

/// Application-level failure code for capability errors.
pub const ENVELOPE_ERROR_CODE: i64 = -32000;

impl Envelope {
    /// Build a success envelope.
    pub fn result(data: serde_json::Value, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: Some(data),
            error: None,
            id,
        }
    }

    /// Build a failure envelope with the standard application error code.
    pub fn error(message: impl Into<String>, id: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            result: None,
            error: Some(EnvelopeError {
                code: ENVELOPE_ERROR_CODE,
                message: message.into(),
            }),
            id,
        }
    }

    /// Render the envelope as the observation text appended to the
    /// running transcript for the model to reason over.
    pub fn render(&self) -> String {
        match (&self.result, &self.error) {
            (Some(result), _) => format!("工具返回结果: {}", result),
            (None, Some(err)) => format!("工具调用失败: {}", err.message),
            (None, None) => "工具返回结果: null".into(),
        }
    }
}

/// Events emitted by the agent loop during one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Incremental reasoning text from the model.
    Thought { content: String },

    /// The agent is invoking a capability.
    Action {
        method: String,
        params: serde_json::Value,
        id: serde_json::Value,
    },

    /// A capability invocation completed.
    Observation { envelope: Envelope },

    /// The final user-facing answer.
    Answer { content: String },

    /// A fatal error occurred mid-run.
    Error { message: String },

    /// The run is complete. Always the last event.
    Done,
}

impl LifecycleEvent {
    /// Wire event name for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thought { .. } => "thought",
            Self::Action { .. } => "action",
            Self::Observation { .. } => "observation",
            Self::Answer { .. } => "answer",
            Self::Error { .. } => "error",
            Self::Done => "done",
        }
    }

    /// Whether this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}
