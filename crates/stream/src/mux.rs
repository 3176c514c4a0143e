//! Tag-delimited two-channel encoding.
//!
//! Used when the transport is one opaque text stream and the receiving UI
//! must tell the process narration and the final content apart using only
//! in-band markers:
//!
//! - narration channel: one complete `<reasoning>…</reasoning>` span,
//!   computed up front and emitted once
//! - content channel: one `<final>` open marker, then raw model chunks
//!   forwarded verbatim (after private-span filtering), then `</final>`
//!   at end of stream
//!
//! The private-reasoning `<think>…</think>` pair nested inside the raw
//! content is a third, separate marker family handled by [`TagFilter`].

use crate::filter::TagFilter;
use braidline_core::error::ModelError;
use futures::Stream;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::debug;

/// Narration channel markers.
pub const REASONING_OPEN: &str = "<reasoning>";
pub const REASONING_CLOSE: &str = "</reasoning>";
/// Content channel markers.
pub const FINAL_OPEN: &str = "<final>";
pub const FINAL_CLOSE: &str = "</final>";

/// Encoder state for one multiplexed response.
///
/// Push-driven: each call produces at most the bytes implied by its input,
/// never buffering ahead of the consumer.
pub struct ChannelMux {
    filter: TagFilter,
    content_opened: bool,
}

impl ChannelMux {
    pub fn new() -> Self {
        Self {
            filter: TagFilter::default(),
            content_opened: false,
        }
    }

    /// The narration channel: one complete tagged span.
    pub fn narration_span(narration: &str) -> String {
        format!("{REASONING_OPEN}{narration}{REASONING_CLOSE}")
    }

    /// Forward one raw model chunk to the content channel. The first call
    /// also emits the open marker; private spans are filtered out.
    pub fn push_content(&mut self, chunk: &str) -> String {
        let mut out = String::new();
        if !self.content_opened {
            out.push_str(FINAL_OPEN);
            self.content_opened = true;
        }
        out.push_str(&self.filter.push(chunk));
        out
    }

    /// End of the content stream: flush the filter and close the channel.
    pub fn close_content(self) -> String {
        let mut out = String::new();
        if !self.content_opened {
            out.push_str(FINAL_OPEN);
        }
        out.push_str(&self.filter.finish());
        out.push_str(FINAL_CLOSE);
        out
    }
}

impl Default for ChannelMux {
    fn default() -> Self {
        Self::new()
    }
}

/// Multiplex a pre-computed narration and a raw model token stream into
/// one ordered text stream.
///
/// The returned receiver yields the narration span first, then the opened
/// and filtered content channel chunk by chunk. Dropping the receiver
/// stops the forwarding task, which releases the upstream model stream. A
/// mid-stream model error ends the content channel cleanly; this encoding
/// has no error frame of its own.
pub fn mux(
    narration: String,
    mut content: mpsc::Receiver<Result<String, ModelError>>,
) -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        if tx.send(ChannelMux::narration_span(&narration)).await.is_err() {
            return;
        }

        let mut encoder = ChannelMux::new();
        while let Some(item) = content.recv().await {
            match item {
                Ok(chunk) => {
                    let out = encoder.push_content(&chunk);
                    if !out.is_empty() && tx.send(out).await.is_err() {
                        return;
                    }
                }
                Err(e) => {
                    debug!("content stream error, closing channel: {e}");
                    break;
                }
            }
        }
        let _ = tx.send(encoder.close_content()).await;
    });
    rx
}

/// Adapt a chunk receiver into a `futures::Stream` usable as an HTTP
/// response body by whatever routing layer sits above.
pub fn into_body(rx: mpsc::Receiver<String>) -> impl Stream<Item = String> {
    ReceiverStream::new(rx)
}
