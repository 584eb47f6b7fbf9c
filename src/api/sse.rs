//! Server-Sent Events (SSE) framing for chat-completion streams
//!
//! The OpenAI format sends one JSON document per `data:` line and ends with
//! `data: [DONE]`:
//!
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//!
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//!
//! data: [DONE]
//! ```

use super::ApiError;
use serde_json::Value;

/// Sentinel payload marking the normal end of a stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Something worth acting on in a single SSE line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// Non-empty `choices[0].delta.content`
    Fragment(String),
    /// `data: [DONE]`
    Done,
    /// The provider put an `error` object in the stream
    ProviderError(String),
}

/// Parse a single SSE line.
///
/// Returns `Ok(None)` for lines that carry nothing: blanks, comments, `event:`
/// and `id:` fields, and data payloads without text content. A `data:` payload
/// that is not valid JSON is a protocol error.
pub fn parse_sse_line(line: &str) -> Result<Option<SseEvent>, ApiError> {
    let line = line.trim();

    // Skip empty lines and SSE comments
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let Some(data) = data_payload(line) else {
        return Ok(None);
    };

    if data == DONE_SENTINEL {
        return Ok(Some(SseEvent::Done));
    }

    let json: Value = serde_json::from_str(data).map_err(|e| ApiError::Protocol {
        message: format!("JSON parse error: {}", e),
        payload: data.to_string(),
    })?;

    if let Some(error) = json.get("error").filter(|e| e.is_object()) {
        let msg = error["message"]
            .as_str()
            .unwrap_or("Unknown streaming error")
            .to_string();
        return Ok(Some(SseEvent::ProviderError(msg)));
    }

    if let Some(content) = json["choices"][0]["delta"]["content"].as_str() {
        if !content.is_empty() {
            return Ok(Some(SseEvent::Fragment(content.to_string())));
        }
    }

    Ok(None)
}

/// Strip the `data:` field name and at most one following space
fn data_payload(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Reassembles lines from text that arrives in arbitrary pieces.
///
/// Text after the last newline is kept until the next push, so a line cut in
/// half by a chunk boundary comes out whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    partial: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every line it completed, without terminators
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.partial.push_str(text);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.partial[start..].find('\n') {
            let end = start + offset;
            lines.push(self.partial[start..end].trim_end_matches('\r').to_string());
            start = end + 1;
        }
        self.partial.drain(..start);

        lines
    }

    /// Return the unterminated remainder at end of stream, if any
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.partial);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_delta() {
        let line = r#"data: {"choices":[{"delta":{"content":"Hello"},"index":0}]}"#;
        match parse_sse_line(line) {
            Ok(Some(SseEvent::Fragment(text))) => assert_eq!(text, "Hello"),
            other => panic!("Expected Fragment, got {:?}", other),
        }
    }

    #[test]
    fn test_done_sentinel() {
        assert_eq!(parse_sse_line("data: [DONE]").unwrap(), Some(SseEvent::Done));
        assert_eq!(parse_sse_line("  data: [DONE]  \r").unwrap(), Some(SseEvent::Done));
    }

    #[test]
    fn test_data_without_space() {
        let line = r#"data:{"choices":[{"delta":{"content":"x"}}]}"#;
        assert_eq!(
            parse_sse_line(line).unwrap(),
            Some(SseEvent::Fragment("x".to_string()))
        );
    }

    #[test]
    fn test_only_one_space_is_stripped() {
        let line = r#"data:  {"choices":[{"delta":{"content":" lead"}}]}"#;
        assert_eq!(
            parse_sse_line(line).unwrap(),
            Some(SseEvent::Fragment(" lead".to_string()))
        );
    }

    #[test]
    fn test_role_only_delta_is_skipped() {
        let line = r#"data: {"choices":[{"delta":{"role":"assistant","content":""}}]}"#;
        assert_eq!(parse_sse_line(line).unwrap(), None);

        let finish = r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        assert_eq!(parse_sse_line(finish).unwrap(), None);
    }

    #[test]
    fn test_malformed_json_is_protocol_error() {
        match parse_sse_line("data: {not json") {
            Err(ApiError::Protocol { payload, .. }) => assert_eq!(payload, "{not json"),
            other => panic!("Expected Protocol error, got {:?}", other),
        }
    }

    #[test]
    fn test_provider_error_object() {
        let line = r#"data: {"error":{"message":"Rate limit reached","type":"requests"}}"#;
        assert_eq!(
            parse_sse_line(line).unwrap(),
            Some(SseEvent::ProviderError("Rate limit reached".to_string()))
        );
    }

    #[test]
    fn test_null_error_field_is_not_an_error() {
        let line = r#"data: {"choices":[{"delta":{"content":"hi"}}],"error":null}"#;
        assert_eq!(
            parse_sse_line(line).unwrap(),
            Some(SseEvent::Fragment("hi".to_string()))
        );

        let empty = r#"data: {"choices":[{"delta":{"content":""}}],"error":"none"}"#;
        assert_eq!(parse_sse_line(empty).unwrap(), None);
    }

    #[test]
    fn test_non_data_lines_skipped() {
        assert_eq!(parse_sse_line("").unwrap(), None);
        assert_eq!(parse_sse_line("  ").unwrap(), None);
        assert_eq!(parse_sse_line(": keep-alive").unwrap(), None);
        assert_eq!(parse_sse_line("event: message").unwrap(), None);
        assert_eq!(parse_sse_line("id: 42").unwrap(), None);
    }

    #[test]
    fn test_line_buffer_keeps_partial_line() {
        let mut buffer = LineBuffer::new();
        assert_eq!(buffer.push("data: {\"a\""), Vec::<String>::new());
        assert_eq!(buffer.push(":1}\n\ndata: [DO"), vec!["data: {\"a\":1}", ""]);
        assert_eq!(buffer.push("NE]\r\n"), vec!["data: [DONE]"]);
        assert_eq!(buffer.finish(), None);
    }

    #[test]
    fn test_line_buffer_flushes_unterminated_tail() {
        let mut buffer = LineBuffer::new();
        assert!(buffer.push("data: [DONE]").is_empty());
        assert_eq!(buffer.finish(), Some("data: [DONE]".to_string()));
        assert_eq!(buffer.finish(), None);
    }
}
