//! Scripted model client — a deterministic `ModelClient` for tests and
//! demos.
//!
//! Each call to `stream` plays back the next scripted turn as a chunked
//! token stream. A turn is either a text chunk sequence or a failure.

use async_trait::async_trait;
use braidline_core::error::ModelError;
use braidline_core::model::{ModelClient, ModelRequest, TokenStream};
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::mpsc;

/// One scripted model turn.
#[derive(Debug, Clone)]
pub enum ScriptedTurn {
    /// Stream these chunks, then end the turn.
    Chunks(Vec<String>),
    /// Fail the turn with this error.
    Fail(ModelError),
}

impl ScriptedTurn {
    /// A turn that streams `text` split into small chunks, to exercise
    /// incremental consumption.
    pub fn text(text: &str) -> Self {
        let chars: Vec<char> = text.chars().collect();
        let chunks = chars.chunks(7).map(|c| c.iter().collect()).collect();
        Self::Chunks(chunks)
    }

    /// A turn delivered as one whole chunk.
    pub fn whole(text: &str) -> Self {
        Self::Chunks(vec![text.to_string()])
    }
}

/// Plays back scripted turns in order; optionally repeats the last turn
/// forever (for budget-exhaustion tests).
pub struct ScriptedModel {
    turns: Mutex<VecDeque<ScriptedTurn>>,
    repeat_last: bool,
    calls: Mutex<usize>,
}

impl ScriptedModel {
    pub fn new(turns: Vec<ScriptedTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
            repeat_last: false,
            calls: Mutex::new(0),
        }
    }

    /// A model that answers with a single text turn.
    pub fn single_text(text: &str) -> Self {
        Self::new(vec![ScriptedTurn::text(text)])
    }

    /// A model that first emits an invocation block, then a final answer.
    pub fn tool_then_answer(tool_block: &str, answer: &str) -> Self {
        Self::new(vec![ScriptedTurn::whole(tool_block), ScriptedTurn::text(answer)])
    }

    /// Repeat the final scripted turn on every call past the end.
    pub fn repeating(turn: ScriptedTurn) -> Self {
        Self {
            turns: Mutex::new(vec![turn].into()),
            repeat_last: true,
            calls: Mutex::new(0),
        }
    }

    /// Number of `stream` calls made so far.
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn stream(&self, _request: ModelRequest) -> Result<TokenStream, ModelError> {
        *self.calls.lock().unwrap() += 1;

        let turn = {
            let mut turns = self.turns.lock().unwrap();
            if self.repeat_last {
                turns.front().cloned()
            } else {
                turns.pop_front()
            }
        };

        let Some(turn) = turn else {
            return Err(ModelError::StreamInterrupted("script exhausted".into()));
        };

        match turn {
            ScriptedTurn::Fail(e) => Err(e),
            ScriptedTurn::Chunks(chunks) => {
                let (tx, rx) = mpsc::channel(8);
                tokio::spawn(async move {
                    for chunk in chunks {
                        if tx.send(Ok(chunk)).await.is_err() {
                            return;
                        }
                    }
                });
                Ok(rx)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn plays_turns_in_order() {
        let model = ScriptedModel::new(vec![ScriptedTurn::whole("one"), ScriptedTurn::whole("two")]);

        for expected in ["one", "two"] {
            let mut rx = model
                .stream(ModelRequest::new("m", vec![]))
                .await
                .unwrap();
            let mut text = String::new();
            while let Some(Ok(chunk)) = rx.recv().await {
                text.push_str(&chunk);
            }
            assert_eq!(text, expected);
        }
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn exhausted_script_errors() {
        let model = ScriptedModel::single_text("only");
        let _ = model.stream(ModelRequest::new("m", vec![])).await.unwrap();
        assert!(model.stream(ModelRequest::new("m", vec![])).await.is_err());
    }

    #[tokio::test]
    async fn repeating_never_exhausts() {
        let model = ScriptedModel::repeating(ScriptedTurn::whole("again"));
        for _ in 0..4 {
            assert!(model.stream(ModelRequest::new("m", vec![])).await.is_ok());
        }
    }
}
