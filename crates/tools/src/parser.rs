//! Invocation-block parser — extracts structured capability calls from raw,
//! untrusted model output.
//!
//! The wire grammar is tag-wrapped JSON:
//!
//! ```text
//! <tool_call name="CAPABILITY">{"key": "value"}</tool_call>
//! ```
//!
//! A hand-written scanner (delimiter search + balanced-brace matching) is
//! used instead of regex so adversarial model output cannot trigger
//! catastrophic backtracking. Any parse failure is treated as "no match":
//! the malformed block is logged and skipped, and scanning continues, since
//! a model may emit one bad block followed by valid ones.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Literal that opens an invocation block.
pub const OPEN_MARKER: &str = "<tool_call";
/// Literal that closes an invocation block.
pub const CLOSE_MARKER: &str = "</tool_call>";

/// One capability call extracted from model output.
///
/// Constructed exclusively by [`parse`]; the correlation id is assigned
/// sequentially (1-based) within one parse call and echoed in the
/// observation envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRequest {
    /// Correlation token (string or number).
    pub id: serde_json::Value,

    /// Name of the capability to invoke.
    pub name: String,

    /// Argument mapping from the embedded JSON object.
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

/// A structurally complete block located by the scanner.
struct RawBlock {
    start: usize,
    end: usize,
    name: String,
    payload_start: usize,
    payload_end: usize,
}

/// Extract all invocation requests from `text`, in order of appearance.
///
/// Blocks that fail structural validation or payload decoding are skipped;
/// parsing never aborts early.
pub fn parse(text: &str) -> Vec<InvocationRequest> {
    let mut requests = Vec::new();
    for block in scan(text) {
        let payload = &text[block.payload_start..block.payload_end];
        match serde_json::from_str::<serde_json::Value>(payload) {
            Ok(serde_json::Value::Object(arguments)) => {
                let id = serde_json::json!(requests.len() as u64 + 1);
                requests.push(InvocationRequest {
                    id,
                    name: block.name,
                    arguments,
                });
            }
            _ => {
                debug!(
                    capability = %block.name,
                    offset = block.start,
                    "invocation block payload is not a JSON object, skipping"
                );
            }
        }
    }
    requests
}

/// Remove every structurally complete invocation block from `text`.
pub fn strip_invocations(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    for block in scan(text) {
        out.push_str(&text[pos..block.start]);
        pos = block.end;
    }
    out.push_str(&text[pos..]);
    out.trim().to_string()
}

/// Remove just the delimiter markers, leaving payload text in place.
///
/// Fallback for the answer-cleanup chain: used when stripping whole blocks
/// would leave the answer empty.
pub fn strip_markers(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    while pos < text.len() {
        let rest = &text[pos..];
        if rest.starts_with(CLOSE_MARKER) {
            pos += CLOSE_MARKER.len();
            continue;
        }
        if rest.starts_with(OPEN_MARKER) {
            // Drop through the tag's closing '>' when present.
            match rest.find('>') {
                Some(gt) => pos += gt + 1,
                None => pos += OPEN_MARKER.len(),
            }
            continue;
        }
        match rest.chars().next() {
            Some(c) => {
                out.push(c);
                pos += c.len_utf8();
            }
            None => break,
        }
    }
    out.trim().to_string()
}

/// Locate every structurally complete block, skipping malformed ones.
fn scan(text: &str) -> Vec<RawBlock> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while let Some(rel) = text[pos..].find(OPEN_MARKER) {
        let start = pos + rel;
        match scan_block(text, start) {
            Some(block) => {
                pos = block.end;
                blocks.push(block);
            }
            None => {
                debug!(offset = start, "malformed invocation block, skipping");
                pos = start + OPEN_MARKER.len();
            }
        }
    }
    blocks
}

/// Scan one block starting at the open marker. Returns `None` on any
/// structural defect (no `name` attribute, unterminated tag, payload not a
/// brace-balanced object, missing close tag).
fn scan_block(text: &str, start: usize) -> Option<RawBlock> {
    let attr_start = start + OPEN_MARKER.len();

    // `<tool_call` must be followed by whitespace, not a longer tag name.
    if !text[attr_start..].starts_with(|c: char| c.is_whitespace()) {
        return None;
    }

    // Tag head: everything up to '>' must hold `name="..."` and nothing
    // that opens another tag.
    let head_len = text[attr_start..].find('>')?;
    let head = &text[attr_start..attr_start + head_len];
    if head.contains('<') {
        return None;
    }
    let name = parse_name_attr(head)?;

    // Payload: optional whitespace, then a balanced JSON object literal.
    let mut payload_start = attr_start + head_len + 1;
    payload_start += leading_whitespace(&text[payload_start..]);
    let payload_end = scan_json_object(text, payload_start)?;

    // Close tag: optional whitespace, then the literal.
    let mut close_start = payload_end;
    close_start += leading_whitespace(&text[close_start..]);
    if !text[close_start..].starts_with(CLOSE_MARKER) {
        return None;
    }

    Some(RawBlock {
        start,
        end: close_start + CLOSE_MARKER.len(),
        name,
        payload_start,
        payload_end,
    })
}

/// Extract the quoted value of the `name` attribute from a tag head.
fn parse_name_attr(head: &str) -> Option<String> {
    let rest = head.trim();
    let value = rest.strip_prefix("name=\"").or_else(|| {
        // Tolerate other attributes before `name`.
        let idx = rest.find("name=\"")?;
        Some(&rest[idx + "name=\"".len()..])
    })?;
    let end = value.find('"')?;
    if end == 0 {
        return None;
    }
    Some(value[..end].to_string())
}

/// Byte length of leading ASCII whitespace.
fn leading_whitespace(s: &str) -> usize {
    s.len() - s.trim_start().len()
}

/// Scan a brace-balanced JSON object starting at `start`. Returns the end
/// index (exclusive). String literals and escapes are honored so braces
/// inside argument values do not confuse the depth count.
fn scan_json_object(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    if start >= bytes.len() || bytes[start] != b'{' {
        return None;
    }

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (i, &b) in bytes[start..].iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start + i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_block() {
        let text = r#"Let me check. <tool_call name="echo">{"text": "hi"}</tool_call> Done."#;
        let requests = parse(text);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "echo");
        assert_eq!(requests[0].arguments["text"], "hi");
        assert_eq!(requests[0].id, serde_json::json!(1));
    }

    #[test]
    fn extracts_blocks_in_document_order() {
        let text = concat!(
            "first ",
            r#"<tool_call name="a">{"x": 1}</tool_call>"#,
            " middle ",
            r#"<tool_call name="b">{"y": 2}</tool_call>"#,
            " last"
        );
        let requests = parse(text);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].name, "a");
        assert_eq!(requests[1].name, "b");
        assert_eq!(requests[0].id, serde_json::json!(1));
        assert_eq!(requests[1].id, serde_json::json!(2));
    }

    #[test]
    fn malformed_block_does_not_abort_parsing() {
        // First block has an unparsable payload; second is valid.
        let text = concat!(
            r#"<tool_call name="bad">{broken</tool_call>"#,
            " then ",
            r#"<tool_call name="good">{"k": "v"}</tool_call>"#
        );
        let requests = parse(text);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "good");
    }

    #[test]
    fn block_without_name_is_skipped() {
        let text = r#"<tool_call >{"k": 1}</tool_call> and <tool_call name="ok">{}</tool_call>"#;
        let requests = parse(text);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "ok");
    }

    #[test]
    fn unknown_capability_is_not_filtered_here() {
        let text = r#"<tool_call name="no_such_tool">{"a": 1}</tool_call>"#;
        let requests = parse(text);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].name, "no_such_tool");
    }

    #[test]
    fn braces_inside_string_values_do_not_confuse_scanner() {
        let text = r#"<tool_call name="echo">{"text": "a } b { c \" d"}</tool_call>"#;
        let requests = parse(text);
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].arguments["text"], "a } b { c \" d");
    }

    #[test]
    fn multiline_payload_accepted() {
        let text = "<tool_call name=\"echo\">\n{\"text\": \"hi\"}\n</tool_call>";
        let requests = parse(text);
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn prose_without_blocks_yields_nothing() {
        assert!(parse("Just a normal answer with no calls.").is_empty());
        assert!(parse("A stray < and > here").is_empty());
    }

    #[test]
    fn strip_invocations_removes_whole_blocks() {
        let text = r#"Before <tool_call name="echo">{"text": "hi"}</tool_call> after"#;
        assert_eq!(strip_invocations(text), "Before  after".trim());
    }

    #[test]
    fn strip_markers_keeps_payload() {
        let text = r#"<tool_call name="echo">{"text": "hi"}</tool_call>"#;
        assert_eq!(strip_markers(text), r#"{"text": "hi"}"#);
    }

    #[test]
    fn strip_invocations_keeps_malformed_text() {
        // Malformed blocks are not structurally complete, so the text stays.
        let text = r#"oops <tool_call name="bad">{broken"#;
        assert_eq!(strip_invocations(text), text);
    }
}
