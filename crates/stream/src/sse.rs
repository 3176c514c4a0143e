//! Discrete event encoding — one typed frame per lifecycle event.
//!
//! Wire format, per frame:
//!
//! ```text
//! event: <type>
//! data: <json>
//!
//! ```
//!
//! The terminal frame is always `event: done` / `data: null`. Encoding is
//! purely synchronous per event; the decoder is incremental and tolerates
//! frame boundaries split across network reads.

use braidline_core::error::EncodeError;
use braidline_core::event::LifecycleEvent;
use tracing::debug;

/// Encode one lifecycle event as a frame.
///
/// The match is exhaustive through `event_type()`, so adding an event kind
/// without a frame shape fails to compile rather than silently dropping.
pub fn encode(event: &LifecycleEvent) -> Result<String, EncodeError> {
    let data = match event {
        LifecycleEvent::Done => "null".to_string(),
        other => serde_json::to_string(other).map_err(|e| EncodeError::Payload(e.to_string()))?,
    };
    Ok(format!("event: {}\ndata: {}\n\n", event.event_type(), data))
}

/// A decoded `(type, payload)` pair.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrame {
    pub event: String,
    pub data: serde_json::Value,
}

impl DecodedFrame {
    /// Reconstruct the lifecycle event this frame carries, if its payload
    /// round-trips.
    pub fn to_lifecycle_event(&self) -> Option<LifecycleEvent> {
        if self.event == "done" {
            return Some(LifecycleEvent::Done);
        }
        serde_json::from_value(self.data.clone()).ok()
    }
}

/// Incremental frame decoder (client side).
///
/// Buffers incoming text, holds back the last incomplete line, and only
/// dispatches a frame once an `event:` line and a `data:` line have been
/// seen followed by a blank line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a fragment of the byte stream; returns every frame completed
    /// by it. Frames with missing fields or unparsable payloads are
    /// dropped with a log, never an abort.
    pub fn feed(&mut self, fragment: &str) -> Vec<DecodedFrame> {
        self.buf.push_str(fragment);
        let mut frames = Vec::new();

        while let Some(end) = self.buf.find("\n\n") {
            let raw: String = self.buf.drain(..end + 2).collect();
            match Self::parse_frame(raw.trim_end()) {
                Some(frame) => frames.push(frame),
                None => debug!(frame = %raw.trim_end(), "dropping malformed frame"),
            }
        }
        frames
    }

    fn parse_frame(raw: &str) -> Option<DecodedFrame> {
        let mut event = None;
        let mut data = None;
        for line in raw.lines() {
            if let Some(rest) = line.strip_prefix("event: ") {
                event = Some(rest.to_string());
            } else if let Some(rest) = line.strip_prefix("data: ") {
                data = Some(serde_json::from_str(rest).ok()?);
            }
        }
        Some(DecodedFrame {
            event: event?,
            data: data?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braidline_core::event::Envelope;

    fn sample_events() -> Vec<LifecycleEvent> {
        vec![
            LifecycleEvent::Thought {
                content: "let me check".into(),
            },
            LifecycleEvent::Action {
                method: "echo".into(),
                params: serde_json::json!({"text": "hi"}),
                id: serde_json::json!(1),
            },
            LifecycleEvent::Observation {
                envelope: Envelope::result(serde_json::json!("hi"), serde_json::json!(1)),
            },
            LifecycleEvent::Answer {
                content: "hi there".into(),
            },
            LifecycleEvent::Done,
        ]
    }

    #[test]
    fn terminal_frame_is_done_null() {
        let frame = encode(&LifecycleEvent::Done).unwrap();
        assert_eq!(frame, "event: done\ndata: null\n\n");
    }

    #[test]
    fn frame_shape() {
        let frame = encode(&LifecycleEvent::Thought {
            content: "hi".into(),
        })
        .unwrap();
        assert!(frame.starts_with("event: thought\ndata: "));
        assert!(frame.ends_with("\n\n"));
    }

    #[test]
    fn roundtrip_whole_stream() {
        let events = sample_events();
        let encoded: String = events.iter().map(|e| encode(e).unwrap()).collect();

        let mut decoder = SseDecoder::new();
        let frames = decoder.feed(&encoded);
        let decoded: Vec<LifecycleEvent> = frames
            .iter()
            .map(|f| f.to_lifecycle_event().unwrap())
            .collect();

        assert_eq!(decoded.len(), events.len());
        for (original, roundtripped) in events.iter().zip(&decoded) {
            assert_eq!(
                serde_json::to_string(original).unwrap(),
                serde_json::to_string(roundtripped).unwrap()
            );
        }
    }

    #[test]
    fn roundtrip_fragmented_feed() {
        // Feed the encoded stream one byte at a time; framing must not
        // depend on read boundaries.
        let events = sample_events();
        let encoded: String = events.iter().map(|e| encode(e).unwrap()).collect();

        let mut decoder = SseDecoder::new();
        let mut frames = Vec::new();
        for c in encoded.chars() {
            frames.extend(decoder.feed(c.encode_utf8(&mut [0u8; 4])));
        }

        assert_eq!(frames.len(), events.len());
        assert_eq!(frames.last().unwrap().event, "done");
    }

    #[test]
    fn incomplete_frame_held_back() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed("event: thought\ndata: {\"type\":\"thou").is_empty());
        let frames = decoder.feed("ght\",\"content\":\"x\"}\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "thought");
    }

    #[test]
    fn malformed_frame_dropped_stream_continues() {
        let mut decoder = SseDecoder::new();
        let frames = decoder.feed("garbage line\n\nevent: done\ndata: null\n\n");
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event, "done");
    }
}
