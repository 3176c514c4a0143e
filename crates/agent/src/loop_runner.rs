//! The agent loop — Thought → Action → Observation.
//!
//! Each iteration streams a model response, scans it for invocation
//! blocks, executes them in order, and feeds the observations back as the
//! next turn's context. The loop terminates on the first iteration with
//! zero invocations (the model's final answer), or when the iteration
//! budget runs out.
//!
//! # Event contract
//!
//! For one run, events arrive in strict temporal order; at most one
//! `answer` is emitted, and `done` is always the final event — including
//! on the error path, because callers close their transport on `done`.
//! Tool failures are surfaced to the model as observations and never fail
//! the run; only model-call failures are fatal.

use braidline_core::event::LifecycleEvent;
use braidline_core::message::{Message, Transcript};
use braidline_core::model::{ModelClient, ModelRequest};
use braidline_tools::{parser, CapabilityRegistry, ToolExecutor};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Synthetic user instruction appended after a tool-bearing turn.
const CONTINUE_INSTRUCTION: &str = "请根据工具返回的结果继续回答。";

/// Answer emitted when the iteration budget is exhausted.
const TIMED_OUT_ANSWER: &str = "处理超时：已达到最大推理轮数，请换一种问法再试。";

/// Configuration for the agent loop.
pub struct AgentLoop {
    /// Chat-completion backend.
    model: Arc<dyn ModelClient>,
    /// Model name passed through to the backend.
    model_name: String,
    /// Temperature.
    temperature: f32,
    /// Max tokens per model response.
    max_tokens: Option<u32>,
    /// Shared capability registry (read-only during runs).
    registry: Arc<CapabilityRegistry>,
    /// Maximum reasoning iterations.
    max_iterations: u32,
}

impl AgentLoop {
    pub fn new(model: Arc<dyn ModelClient>, registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            model,
            model_name: "deepseek-chat".into(),
            temperature: 0.7,
            max_tokens: None,
            registry,
            max_iterations: 5,
        }
    }

    /// Build from a pipeline config.
    pub fn from_config(
        model: Arc<dyn ModelClient>,
        registry: Arc<CapabilityRegistry>,
        config: &braidline_config::PipelineConfig,
    ) -> Self {
        Self::new(model, registry)
            .with_model_name(&config.model)
            .with_temperature(config.temperature)
            .with_max_iterations(config.max_iterations)
            .with_max_tokens_opt(config.max_tokens)
    }

    /// Set the model name.
    pub fn with_model_name(mut self, name: impl Into<String>) -> Self {
        self.model_name = name.into();
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    /// Set the max tokens per model response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    fn with_max_tokens_opt(mut self, max: Option<u32>) -> Self {
        self.max_tokens = max;
        self
    }

    /// Execute one run.
    ///
    /// Returns a receiver of lifecycle events; the run itself executes on
    /// a background task. Dropping the receiver aborts the run and
    /// releases the upstream model stream. `run` never fails from the
    /// caller's perspective — fatal errors arrive as an `error` event,
    /// always followed by `done`.
    pub fn run(
        &self,
        user_message: &str,
        history: Vec<Message>,
        system_instruction: impl Into<String>,
    ) -> mpsc::Receiver<LifecycleEvent> {
        let (tx, rx) = mpsc::channel::<LifecycleEvent>(64);

        let model = self.model.clone();
        let model_name = self.model_name.clone();
        let temperature = self.temperature;
        let max_tokens = self.max_tokens;
        let executor = ToolExecutor::new(self.registry.clone());
        let max_iterations = self.max_iterations;

        let mut transcript = Transcript::with_context(system_instruction, history);
        transcript.push(Message::user(user_message));

        tokio::spawn(async move {
            info!(model = %model_name, max_iter = max_iterations, "agent loop starting");

            for iteration in 1..=max_iterations {
                debug!(iteration, "agent iteration");

                let request = ModelRequest {
                    model: model_name.clone(),
                    messages: transcript.messages.clone(),
                    temperature,
                    max_tokens,
                };

                // ── Stream the model response ──
                let mut stream = match model.stream(request).await {
                    Ok(s) => s,
                    Err(e) => {
                        warn!("agent loop failed: model call error: {e}");
                        send_error_then_done(&tx, e.to_string()).await;
                        return;
                    }
                };

                let mut full_text = String::new();
                while let Some(item) = stream.recv().await {
                    match item {
                        Ok(delta) => {
                            full_text.push_str(&delta);
                            if tx
                                .send(LifecycleEvent::Thought { content: delta })
                                .await
                                .is_err()
                            {
                                // Consumer disconnected; dropping `stream`
                                // releases the model call.
                                debug!("consumer disconnected, aborting run");
                                return;
                            }
                        }
                        Err(e) => {
                            warn!("agent loop failed: stream error: {e}");
                            send_error_then_done(&tx, e.to_string()).await;
                            return;
                        }
                    }
                }

                // ── Scan for invocations ──
                let requests = parser::parse(&full_text);

                if requests.is_empty() {
                    // Final answer. Defensive cleanup so block remnants
                    // never reach the user, with fallbacks so the answer
                    // is never blank when the model emitted something.
                    let answer = clean_answer(&full_text);
                    info!(iteration, "agent loop answered");
                    if tx
                        .send(LifecycleEvent::Answer { content: answer })
                        .await
                        .is_err()
                    {
                        return;
                    }
                    let _ = tx.send(LifecycleEvent::Done).await;
                    return;
                }

                // ── Execute invocations in document order ──
                let mut turn_text = full_text;
                for request in &requests {
                    let action = LifecycleEvent::Action {
                        method: request.name.clone(),
                        params: serde_json::Value::Object(request.arguments.clone()),
                        id: request.id.clone(),
                    };
                    if tx.send(action).await.is_err() {
                        return;
                    }

                    let (result, id) = executor.execute(request).await;
                    let envelope = result.into_envelope(id);

                    turn_text.push('\n');
                    turn_text.push_str(&envelope.render());

                    if tx
                        .send(LifecycleEvent::Observation { envelope })
                        .await
                        .is_err()
                    {
                        return;
                    }
                }

                transcript.push(Message::assistant(turn_text));
                transcript.push(Message::user(CONTINUE_INSTRUCTION));
            }

            // ── Iteration budget exhausted ──
            warn!(max_iterations, "agent loop timed out");
            if tx
                .send(LifecycleEvent::Answer {
                    content: TIMED_OUT_ANSWER.into(),
                })
                .await
                .is_ok()
            {
                let _ = tx.send(LifecycleEvent::Done).await;
            }
        });

        rx
    }
}

/// Emit the terminal pair for the fatal path. `done` must follow `error`
/// even here: callers close their transport on `done`.
async fn send_error_then_done(tx: &mpsc::Sender<LifecycleEvent>, message: String) {
    if tx.send(LifecycleEvent::Error { message }).await.is_ok() {
        let _ = tx.send(LifecycleEvent::Done).await;
    }
}

/// Answer cleanup chain: strip whole invocation blocks; if that leaves
/// nothing, strip just the delimiter markers; if still nothing, hand back
/// the raw text untouched.
fn clean_answer(raw: &str) -> String {
    let stripped = parser::strip_invocations(raw);
    if !stripped.is_empty() {
        return stripped;
    }
    let markers_only = parser::strip_markers(raw);
    if !markers_only.is_empty() {
        return markers_only;
    }
    raw.to_string()
}
