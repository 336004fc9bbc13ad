// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Call parser
//!
//! Pulls structured call requests out of free-form model output. Models
//! don't reliably follow the requested format, so three encodings are
//! tried in order:
//!
//! 1. the first ```` ```json ```` fenced block (only the first one),
//! 2. an unfenced `{"tool_calls": [...]}` object anywhere in the text,
//! 3. the whole trimmed reply decoded as one JSON object.
//!
//! A reply containing a fenced block is decided by that block alone; the
//! unfenced stages only run when there is no fence. Anything malformed
//! simply yields no calls.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::tools::CallRequest;

/// First ```json fenced block; body captured lazily
static FENCED_BLOCK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)```json\s*(.*?)\s*```").expect("fenced block pattern is valid")
});

/// Inline `{"tool_calls": [...]}` allowing one level of nested brackets
static INLINE_CALLS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"\{\s*"tool_calls"\s*:\s*\[(?:[^\[\]]|\[[^\[\]]*\])*\]\s*\}"#)
        .expect("inline calls pattern is valid")
});

/// Where in the reply the calls were found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallEncoding {
    Fenced,
    Inline,
    WholeText,
}

/// Extract call requests from `text`, in order. Never fails.
pub fn parse(text: &str) -> Vec<CallRequest> {
    parse_with_encoding(text)
        .map(|(_, calls)| calls)
        .unwrap_or_default()
}

/// Like [`parse`], also reporting which encoding matched
pub fn parse_with_encoding(text: &str) -> Option<(CallEncoding, Vec<CallRequest>)> {
    let found = match first_fenced_body(text) {
        Some(body) => decode_calls(body).map(|calls| (CallEncoding::Fenced, calls)),
        None => from_inline_object(text)
            .map(|calls| (CallEncoding::Inline, calls))
            .or_else(|| from_whole_text(text).map(|calls| (CallEncoding::WholeText, calls))),
    };

    match &found {
        Some((encoding, calls)) => tracing::debug!(
            target: "toolchat.chat.parser",
            ?encoding,
            calls = calls.len(),
            "parsed tool calls"
        ),
        None => tracing::trace!(target: "toolchat.chat.parser", "no tool calls in reply"),
    }

    found
}

fn first_fenced_body(text: &str) -> Option<&str> {
    Some(FENCED_BLOCK_PATTERN.captures(text)?.get(1)?.as_str())
}

fn from_inline_object(text: &str) -> Option<Vec<CallRequest>> {
    INLINE_CALLS_PATTERN
        .find_iter(text)
        .find_map(|m| decode_calls(m.as_str()))
}

fn from_whole_text(text: &str) -> Option<Vec<CallRequest>> {
    decode_calls(text.trim())
}

/// Decode an object with a non-empty `tool_calls` array
fn decode_calls(json: &str) -> Option<Vec<CallRequest>> {
    let value: Value = serde_json::from_str(json).ok()?;
    let calls: Vec<CallRequest> = value
        .as_object()?
        .get("tool_calls")?
        .as_array()?
        .iter()
        .map(CallRequest::from_value)
        .collect();

    if calls.is_empty() {
        None
    } else {
        Some(calls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fenced_block() {
        let text = "Let me add those.\n```json\n{\"tool_calls\":[{\"name\":\"add_numbers\",\"arguments\":{\"a\":2,\"b\":3}}]}\n```";
        let (encoding, calls) = parse_with_encoding(text).unwrap();

        assert_eq!(encoding, CallEncoding::Fenced);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name.as_deref(), Some("add_numbers"));
        assert_eq!(calls[0].arguments, json!({"a": 2, "b": 3}));
    }

    #[test]
    fn test_fenced_block_multiple_calls_keep_order() {
        let text = r#"```json
{"tool_calls": [
  {"name": "multiply_numbers", "arguments": {"a": 2, "b": 4}},
  {"name": "add_numbers", "arguments": {"a": 1, "b": 1}}
]}
```"#;
        let calls = parse(text);
        let names: Vec<_> = calls.iter().map(|c| c.name.clone().unwrap()).collect();
        assert_eq!(names, vec!["multiply_numbers", "add_numbers"]);
    }

    #[test]
    fn test_only_first_fenced_block_considered() {
        let text = "```json\n{not valid}\n```\nand\n```json\n{\"tool_calls\":[{\"name\":\"x\",\"arguments\":{}}]}\n```";
        assert!(parse_with_encoding(text).is_none());
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_bad_fence_hides_unfenced_object() {
        let text = "```json\n{\"tool_calls\": []}\n```\nor {\"tool_calls\":[{\"name\":\"y\",\"arguments\":{}}]}";
        assert!(parse(text).is_empty());
    }

    #[test]
    fn test_first_fenced_block_wins_over_later_ones() {
        let text = "```json\n{\"tool_calls\":[{\"name\":\"first\",\"arguments\":{}}]}\n```\n```json\n{\"tool_calls\":[{\"name\":\"second\",\"arguments\":{}}]}\n```";
        let calls = parse(text);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].name.as_deref(), Some("first"));
    }

    #[test]
    fn test_inline_object() {
        let text = r#"Sure: {"tool_calls": [{"name": "divide_numbers", "arguments": {"a": 9, "b": 3}}]} done"#;
        let (encoding, calls) = parse_with_encoding(text).unwrap();
        assert_eq!(encoding, CallEncoding::Inline);
        assert_eq!(calls[0].name.as_deref(), Some("divide_numbers"));
    }

    #[test]
    fn test_inline_object_with_nested_array() {
        let text = r#"{"tool_calls": [{"name": "sum", "arguments": {"values": [1, 2, 3]}}]}"#;
        let calls = parse(text);
        assert_eq!(calls[0].arguments, json!({"values": [1, 2, 3]}));
    }

    #[test]
    fn test_whole_text_object() {
        let text = r#"  {"reason": "x", "tool_calls": [{"name": "add_numbers", "arguments": {"a": [[1]], "b": 2}}]}  "#;
        let (encoding, calls) = parse_with_encoding(text).unwrap();
        assert_eq!(encoding, CallEncoding::WholeText);
        assert_eq!(calls[0].name.as_deref(), Some("add_numbers"));
    }

    #[test]
    fn test_plain_text_has_no_calls() {
        assert!(parse("The answer is 5.").is_empty());
        assert!(parse("").is_empty());
        assert!(parse_with_encoding("hello").is_none());
    }

    #[test]
    fn test_malformed_json_has_no_calls() {
        assert!(parse("```json\n{\"tool_calls\": [\n```").is_empty());
        assert!(parse("{\"tool_calls\": \"add\"}").is_empty());
        assert!(parse("[1, 2, 3]").is_empty());
        assert!(parse("{\"tool_calls\": []}").is_empty());
    }

    #[test]
    fn test_missing_name_is_forwarded() {
        let calls = parse(r#"{"tool_calls": [{"arguments": {"a": 1}}]}"#);
        assert_eq!(calls.len(), 1);
        assert!(calls[0].name.is_none());
    }

    #[test]
    fn test_missing_arguments_default_empty() {
        let calls = parse(r#"{"tool_calls": [{"name": "ping"}]}"#);
        assert_eq!(calls[0].arguments, json!({}));
    }

    #[test]
    fn test_uppercase_fence_tag() {
        let text = "```JSON\n{\"tool_calls\":[{\"name\":\"a\",\"arguments\":{}}]}\n```";
        let (encoding, _) = parse_with_encoding(text).unwrap();
        assert_eq!(encoding, CallEncoding::Fenced);
    }
}
