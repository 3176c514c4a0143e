//! Boundary-safe tag filter — removes a marker-delimited span from a
//! chunked text stream.
//!
//! The model's raw content stream may carry a private-reasoning span
//! (`<think>…</think>`) that must never reach the content channel. Because
//! a marker can be split across two network chunks, the filter retains the
//! last `open_len − 1` bytes of un-matched text between pushes; without
//! that, a split marker would leak.
//!
//! Contract: for any input split at any byte offsets, the concatenated
//! output is identical. Tested directly at every split point.

/// Default private-span markers.
pub const THINK_OPEN: &str = "<think>";
pub const THINK_CLOSE: &str = "</think>";

/// Stateful filter over a chunked text stream.
#[derive(Debug)]
pub struct TagFilter {
    open: String,
    close: String,
    buf: String,
    in_span: bool,
}

impl Default for TagFilter {
    fn default() -> Self {
        Self::new(THINK_OPEN, THINK_CLOSE)
    }
}

impl TagFilter {
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: close.into(),
            buf: String::new(),
            in_span: false,
        }
    }

    /// Feed one incoming chunk; returns the text that is safe to emit.
    pub fn push(&mut self, chunk: &str) -> String {
        self.buf.push_str(chunk);
        let mut out = String::new();

        loop {
            if self.in_span {
                match self.buf.find(&self.close) {
                    Some(idx) => {
                        // Drop the span body and the close marker.
                        self.buf.drain(..idx + self.close.len());
                        self.in_span = false;
                    }
                    // Span still open; emit nothing, keep buffering.
                    None => break,
                }
            } else {
                match self.buf.find(&self.open) {
                    Some(idx) => {
                        out.push_str(&self.buf[..idx]);
                        self.buf.drain(..idx + self.open.len());
                        self.in_span = true;
                    }
                    None => {
                        // Everything but a potential marker prefix is safe.
                        let hold = self.open.len() - 1;
                        if self.buf.len() > hold {
                            let mut split = self.buf.len() - hold;
                            while !self.buf.is_char_boundary(split) {
                                split -= 1;
                            }
                            out.extend(self.buf.drain(..split));
                        }
                        break;
                    }
                }
            }
        }

        out
    }

    /// Signal end of stream; returns any remaining safe text.
    ///
    /// A stream that ends mid-span drops the unterminated remainder
    /// rather than leaking it.
    pub fn finish(mut self) -> String {
        if self.in_span {
            return String::new();
        }
        std::mem::take(&mut self.buf)
    }
}
