// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Display formatting for the chat interface
//!
//! Functions here return strings rather than writing to stdout so they can
//! be tested directly. Nothing in this module touches stored messages; the
//! conversation always keeps the raw model text.

use regex::Regex;
use std::sync::LazyLock;

use crate::tools::{CallOutcome, CallResult};

static JSON_BLOCK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```json.*?```").expect("json block pattern is valid"));

static TOOL_CALLS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)"tool_calls":\s*\[.*?\]"#).expect("tool_calls pattern is valid")
});

static LONE_BRACE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[{}]\s*$").expect("lone brace pattern is valid"));

/// Strip call protocol artifacts from a reply for display.
///
/// Removes fenced JSON blocks, then any `"tool_calls": [...]` structure,
/// then lines holding only a brace. If nothing is left the original text
/// is returned unchanged.
pub fn clean_response(content: &str) -> String {
    let cleaned = JSON_BLOCK_PATTERN.replace_all(content, "");
    let cleaned = TOOL_CALLS_PATTERN.replace_all(cleaned.trim(), "");
    let cleaned = LONE_BRACE_PATTERN.replace_all(cleaned.trim(), "");
    let cleaned = cleaned.trim();

    if cleaned.is_empty() {
        content.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Truncate a string for display with ellipsis
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        return s.to_string();
    }
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}

/// One-line summary of a tool invocation
pub fn format_tool_invocation(tool_name: Option<&str>, arguments: &serde_json::Value) -> String {
    let name = tool_name.unwrap_or("<unnamed>");
    let args = serde_json::to_string(arguments).unwrap_or_else(|_| arguments.to_string());
    format!("{}({})", name, truncate_string(&args, 60))
}

/// One-line summary of a tool result
pub fn format_tool_result(result: &CallResult) -> String {
    match &result.outcome {
        CallOutcome::Success(_) => {
            format!("{} → {}", result.call_id, truncate_string(&result.content(), 80))
        }
        CallOutcome::UnknownCapability => format!("{} ✗ {}", result.call_id, result.content()),
        CallOutcome::InvocationError(_) => {
            format!("{} ✗ {}", result.call_id, truncate_string(&result.content(), 80))
        }
    }
}

/// Banner shown when the REPL starts
pub fn format_welcome(engine_name: &str, tool_names: &[&str]) -> String {
    let rule = "=".repeat(60);
    let tools = if tool_names.is_empty() {
        "(none)".to_string()
    } else {
        tool_names.join(", ")
    };
    format!(
        "{rule}\ntoolchat ({engine_name})\n{rule}\nTools: {tools}\nCommands:\n  - Type your message to chat\n  - 'quit', 'exit', or 'q' to exit\n  - 'clear' to clear conversation history\n{rule}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clean_plain_text_unchanged() {
        assert_eq!(clean_response("The answer is 5."), "The answer is 5.");
    }

    #[test]
    fn test_clean_removes_fenced_block() {
        let text = "Let me compute that.\n```json\n{\"tool_calls\": [{\"name\": \"add_numbers\"}]}\n```";
        assert_eq!(clean_response(text), "Let me compute that.");
    }

    #[test]
    fn test_clean_removes_inline_structure_and_braces() {
        let text = "Result below\n{\n\"tool_calls\": [{\"name\": \"x\", \"arguments\": {}}]\n}";
        let cleaned = clean_response(text);
        assert!(!cleaned.contains("tool_calls"));
        assert!(cleaned.starts_with("Result below"));
    }

    #[test]
    fn test_clean_falls_back_to_original_when_empty() {
        let text = "```json\n{\"tool_calls\": []}\n```";
        assert_eq!(clean_response(text), text);
    }

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate_string("ééééééé", 5), "éé...");
    }

    #[test]
    fn test_format_tool_invocation() {
        assert_eq!(
            format_tool_invocation(Some("add_numbers"), &json!({"a": 2})),
            "add_numbers({\"a\":2})"
        );
        assert!(format_tool_invocation(None, &json!({})).starts_with("<unnamed>"));
    }

    #[test]
    fn test_format_tool_result() {
        let ok = CallResult {
            call_id: "add_numbers_0".to_string(),
            name: Some("add_numbers".to_string()),
            outcome: CallOutcome::Success("5.0".to_string()),
        };
        assert_eq!(format_tool_result(&ok), "add_numbers_0 → 5.0");
    }

    #[test]
    fn test_format_welcome_lists_commands() {
        let banner = format_welcome("mock", &["add_numbers"]);
        assert!(banner.contains("'quit', 'exit', or 'q'"));
        assert!(banner.contains("Tools: add_numbers"));
    }
}
