//! Message and Transcript domain types.
//!
//! These are the value objects threaded through one agent run:
//! the caller supplies a system instruction and history, the loop grows
//! the transcript with assistant output and synthetic re-prompts, and
//! the whole thing is dropped when the run completes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender in a transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (capability catalog, rules)
    System,
    /// The end user
    User,
    /// The model
    Assistant,
}

/// A single message in a transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// The ordered message list for one agent run.
///
/// Created at `run()` entry, discarded at `run()` exit — transcripts are
/// never persisted across requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    /// Ordered messages
    pub messages: Vec<Message>,
}

impl Transcript {
    /// Create a transcript seeded with a system instruction and history.
    pub fn with_context(system: impl Into<String>, history: Vec<Message>) -> Self {
        let mut messages = vec![Message::system(system)];
        messages.extend(history);
        Self { messages }
    }

    /// Add a message to the transcript.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Get the total token count estimate (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.messages.iter().map(|m| m.content.len() / 4).sum()
    }
}
