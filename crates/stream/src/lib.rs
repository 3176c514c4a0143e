//! Stream multiplexing for braidline.
//!
//! Two independent wire strategies over the same lifecycle-event sequence:
//!
//! - [`sse`] — discrete typed frames (`event:` / `data:`), with an
//!   incremental split-tolerant decoder
//! - [`mux`] — in-band tag-delimited text for transports with no framing,
//!   built on the boundary-safe [`filter::TagFilter`]
//!
//! Both are push-driven: nothing is buffered ahead of what the consumer
//! has asked for, and dropping the outbound receiver cancels the
//! forwarding task (and with it the upstream model stream).

pub mod filter;
pub mod mux;
pub mod sse;

pub use filter::{TagFilter, THINK_CLOSE, THINK_OPEN};
pub use mux::{ChannelMux, FINAL_CLOSE, FINAL_OPEN, REASONING_CLOSE, REASONING_OPEN};
pub use sse::{encode, DecodedFrame, SseDecoder};

use braidline_core::event::LifecycleEvent;
use tokio::sync::mpsc;
use tracing::warn;

/// Adapt a lifecycle-event receiver into a stream of encoded frames.
///
/// Encoding failures are fatal to the run but still produce a well-formed
/// terminal pair: an `error` frame followed by the `done` frame, so the
/// consumer's transport always closes cleanly.
pub fn encode_events(mut events: mpsc::Receiver<LifecycleEvent>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match sse::encode(&event) {
                Ok(frame) => {
                    if tx.send(frame).await.is_err() {
                        // Consumer disconnected; dropping `events` cancels
                        // the agent run upstream.
                        return;
                    }
                }
                Err(e) => {
                    warn!("frame encoding failed: {e}");
                    let error = LifecycleEvent::Error {
                        message: e.to_string(),
                    };
                    if let Ok(frame) = sse::encode(&error) {
                        let _ = tx.send(frame).await;
                    }
                    if let Ok(frame) = sse::encode(&LifecycleEvent::Done) {
                        let _ = tx.send(frame).await;
                    }
                    return;
                }
            }
        }
    });
    rx
}

/// Adapt a lifecycle-event receiver into the tag-delimited encoding.
///
/// Thoughts, actions, and observations accumulate into the narration
/// payload, which is emitted as one complete span once the final answer
/// arrives; the answer text flows out on the content channel through the
/// private-span filter. A fatal `error` event is forwarded on the content
/// channel: this encoding has no error frame of its own, and the failure
/// notice must stay user-visible.
pub fn encode_tagged(mut events: mpsc::Receiver<LifecycleEvent>) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        let mut narration = String::new();
        let mut encoder = mux::ChannelMux::new();
        let mut narration_sent = false;

        while let Some(event) = events.recv().await {
            let content = match event {
                LifecycleEvent::Thought { content } => {
                    narration.push_str(&content);
                    continue;
                }
                LifecycleEvent::Action { method, .. } => {
                    narration.push_str(&format!("\n[调用 {method}]\n"));
                    continue;
                }
                LifecycleEvent::Observation { envelope } => {
                    narration.push_str(&format!("\n{}\n", envelope.render()));
                    continue;
                }
                LifecycleEvent::Answer { content } => content,
                LifecycleEvent::Error { message } => format!("发生错误: {message}"),
                LifecycleEvent::Done => break,
            };

            if !narration_sent {
                narration_sent = true;
                if tx
                    .send(mux::ChannelMux::narration_span(&narration))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            let out = encoder.push_content(&content);
            if !out.is_empty() && tx.send(out).await.is_err() {
                return;
            }
        }

        if !narration_sent
            && tx
                .send(mux::ChannelMux::narration_span(&narration))
                .await
                .is_err()
        {
            return;
        }
        let _ = tx.send(encoder.close_content()).await;
    });
    rx
}
