// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Prompt encoding
//!
//! Flattens a conversation and the tool catalog into one completion prompt
//! made of role-delimited segments. The segment markers come from a
//! [`PromptTemplate`] and double as the engine's stop sequences.
//!
//! Encoding is a pure function of its inputs: the same messages and
//! registry always produce byte-identical prompts.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ToolchatError;
use crate::llm::message::{Message, Role};
use crate::tools::ToolRegistry;

/// Prefix for tool results when they are sent as user segments
pub const TOOL_RESULT_PREFIX: &str = "Tool Result: ";

const TOOL_POLICY: &str = r#"You are a helpful assistant with access to tools. When you need to use a tool, respond with exactly one JSON block in this format:
```json
{
  "tool_calls": [
    {
      "name": "tool_name",
      "arguments": {"param1": "value1", "param2": "value2"}
    }
  ]
}
```"#;

const TOOL_RULES: &str = "Important rules:
1. Only use tools when necessary. For questions that don't need a tool, respond in plain text without JSON.
2. When calling tools, write a single well-formed JSON block per reply. Several calls may share its tool_calls list.
3. Include all required parameters.
4. Only call tools listed above. Never invent tool names.
5. Tool results are correct. Do not repeat a call that already returned; use its result in a natural language answer.";

/// Segment marker scheme understood by the model
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptTemplate {
    /// `<|start_header_id|>role<|end_header_id|>\n\ncontent<|eot_id|>`
    #[default]
    Llama3,
    /// `<|im_start|>role\ncontent<|im_end|>\n`
    ChatML,
}

impl PromptTemplate {
    /// Render one complete segment
    pub fn segment(&self, role: &str, content: &str) -> String {
        match self {
            PromptTemplate::Llama3 => format!(
                "<|start_header_id|>{}<|end_header_id|>\n\n{}<|eot_id|>",
                role, content
            ),
            PromptTemplate::ChatML => format!("<|im_start|>{}\n{}<|im_end|>\n", role, content),
        }
    }

    /// Open an assistant segment for the model to complete
    pub fn assistant_prefix(&self) -> &'static str {
        match self {
            PromptTemplate::Llama3 => "<|start_header_id|>assistant<|end_header_id|>\n\n",
            PromptTemplate::ChatML => "<|im_start|>assistant\n",
        }
    }

    /// Turn-end marker followed by the end-of-output marker
    pub fn stop_sequences(&self) -> &'static [&'static str] {
        match self {
            PromptTemplate::Llama3 => &["<|eot_id|>", "<|end_of_text|>"],
            PromptTemplate::ChatML => &["<|im_end|>", "<|endoftext|>"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PromptTemplate::Llama3 => "llama3",
            PromptTemplate::ChatML => "chatml",
        }
    }
}

impl fmt::Display for PromptTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PromptTemplate {
    type Err = ToolchatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "llama3" | "llama-3" => Ok(PromptTemplate::Llama3),
            "chatml" => Ok(PromptTemplate::ChatML),
            other => Err(ToolchatError::Config(format!(
                "Unknown prompt template '{}' (expected llama3 or chatml)",
                other
            ))),
        }
    }
}

/// Serializes conversations into completion prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromptEncoder {
    template: PromptTemplate,
    native_tool_role: bool,
}

impl Default for PromptEncoder {
    fn default() -> Self {
        Self::new(PromptTemplate::default(), true)
    }
}

impl PromptEncoder {
    /// `native_tool_role = false` sends tool results as prefixed user segments
    pub fn new(template: PromptTemplate, native_tool_role: bool) -> Self {
        Self {
            template,
            native_tool_role,
        }
    }

    pub fn template(&self) -> PromptTemplate {
        self.template
    }

    /// System text describing the tool protocol and the catalog
    pub fn system_prompt(registry: &ToolRegistry) -> String {
        format!(
            "{}\n\nAvailable tools:\n{}\n\n{}",
            TOOL_POLICY,
            registry.render_catalog(),
            TOOL_RULES
        )
    }

    /// Encode `messages` (in order) with the catalog from `registry`
    pub fn encode(&self, messages: &[Message], registry: &ToolRegistry) -> String {
        let mut prompt = String::new();

        if !registry.is_empty() {
            prompt.push_str(
                &self
                    .template
                    .segment(Role::System.as_str(), &Self::system_prompt(registry)),
            );
        }

        for message in messages {
            match message.role {
                Role::Tool if self.native_tool_role => {
                    prompt.push_str(&self.template.segment("tool", &message.content));
                }
                Role::Tool => {
                    let content = format!("{}{}", TOOL_RESULT_PREFIX, message.content);
                    prompt.push_str(&self.template.segment("user", &content));
                }
                Role::User | Role::Assistant => {
                    prompt.push_str(&self.template.segment(message.role.as_str(), &message.content));
                }
                Role::System => {}
            }
        }

        prompt.push_str(self.template.assistant_prefix());

        tracing::trace!(
            target: "toolchat.chat.prompt",
            template = %self.template,
            messages = messages.len(),
            prompt_chars = prompt.len(),
            "prompt encoded"
        );

        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation() -> Vec<Message> {
        vec![
            Message::user("What is 2 + 3?"),
            Message::assistant("```json\n{\"tool_calls\": []}\n```"),
            Message::tool("add_numbers_0", "5.0"),
        ]
    }

    #[test]
    fn test_llama3_segment() {
        assert_eq!(
            PromptTemplate::Llama3.segment("user", "hi"),
            "<|start_header_id|>user<|end_header_id|>\n\nhi<|eot_id|>"
        );
    }

    #[test]
    fn test_chatml_segment() {
        assert_eq!(
            PromptTemplate::ChatML.segment("user", "hi"),
            "<|im_start|>user\nhi<|im_end|>\n"
        );
        assert_eq!(
            PromptTemplate::ChatML.stop_sequences(),
            &["<|im_end|>", "<|endoftext|>"]
        );
    }

    #[test]
    fn test_template_from_str() {
        assert_eq!(
            "llama3".parse::<PromptTemplate>().unwrap(),
            PromptTemplate::Llama3
        );
        assert_eq!(
            "ChatML".parse::<PromptTemplate>().unwrap(),
            PromptTemplate::ChatML
        );
        assert!("mistral".parse::<PromptTemplate>().is_err());
    }

    #[test]
    fn test_no_tools_no_system_segment() {
        let encoder = PromptEncoder::default();
        let prompt = encoder.encode(&[Message::user("hello")], &ToolRegistry::new());

        assert_eq!(
            prompt,
            "<|start_header_id|>user<|end_header_id|>\n\nhello<|eot_id|>\
             <|start_header_id|>assistant<|end_header_id|>\n\n"
        );
    }

    #[test]
    fn test_system_segment_leads_with_catalog() {
        let encoder = PromptEncoder::default();
        let prompt = encoder.encode(&[Message::user("hello")], &ToolRegistry::with_builtins());

        assert!(prompt.starts_with("<|start_header_id|>system<|end_header_id|>\n\n"));
        assert!(prompt.contains("Available tools:"));
        assert!(prompt.contains("\"name\": \"divide_numbers\""));
        assert!(prompt.contains("Never invent tool names"));
        assert!(prompt.ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n"));
    }

    #[test]
    fn test_native_tool_role() {
        let encoder = PromptEncoder::new(PromptTemplate::Llama3, true);
        let prompt = encoder.encode(&conversation(), &ToolRegistry::new());
        assert!(prompt.contains("<|start_header_id|>tool<|end_header_id|>\n\n5.0<|eot_id|>"));
    }

    #[test]
    fn test_degraded_tool_role() {
        let encoder = PromptEncoder::new(PromptTemplate::Llama3, false);
        let prompt = encoder.encode(&conversation(), &ToolRegistry::new());
        assert!(!prompt.contains("<|start_header_id|>tool"));
        assert!(prompt
            .contains("<|start_header_id|>user<|end_header_id|>\n\nTool Result: 5.0<|eot_id|>"));
    }

    #[test]
    fn test_system_messages_not_reemitted() {
        let encoder = PromptEncoder::default();
        let messages = vec![Message::system("secret framing"), Message::user("hi")];
        let prompt = encoder.encode(&messages, &ToolRegistry::new());
        assert!(!prompt.contains("secret framing"));
    }

    #[test]
    fn test_message_order_preserved() {
        let encoder = PromptEncoder::new(PromptTemplate::ChatML, true);
        let prompt = encoder.encode(&conversation(), &ToolRegistry::new());

        let user = prompt.find("What is 2 + 3?").unwrap();
        let assistant = prompt.find("tool_calls").unwrap();
        let tool = prompt.find("5.0").unwrap();
        assert!(user < assistant && assistant < tool);
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let encoder = PromptEncoder::default();
        let registry = ToolRegistry::with_builtins();
        let first = encoder.encode(&conversation(), &registry);
        let second = encoder.encode(&conversation(), &registry);
        assert_eq!(first, second);
    }
}
