// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Call dispatcher
//!
//! Resolves parsed call requests against the registry, invokes them one at a
//! time in order, and packages every outcome (including failures) as a
//! [`CallResult`]. Nothing a tool does can abort the batch.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde_json::{Map, Value};

use crate::error::{Result, ToolchatError};
use crate::llm::message::Message;

use super::{ToolArguments, ToolRegistry};

/// A structured call extracted from model output. Unvalidated.
#[derive(Debug, Clone, PartialEq)]
pub struct CallRequest {
    /// Requested tool name; may be absent or unknown
    pub name: Option<String>,
    /// Raw arguments as the model wrote them
    pub arguments: Value,
}

impl CallRequest {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: Some(name.into()),
            arguments,
        }
    }

    /// Build a request from one element of a `tool_calls` array.
    ///
    /// Never fails: a missing `name` stays `None`, a non-string name is kept
    /// as its JSON text, and missing `arguments` become an empty object.
    pub fn from_value(value: &Value) -> Self {
        let name = value.get("name").and_then(|n| match n {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });
        let arguments = value
            .get("arguments")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        Self { name, arguments }
    }
}

/// What happened when a call was dispatched
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome {
    /// The tool ran; its value, stringified
    Success(String),
    /// No tool with the requested name
    UnknownCapability,
    /// The tool was found but binding or invocation failed
    InvocationError(String),
}

/// Result of one dispatched call
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    /// `{name}_{index}`, or `unknown_{index}` when unresolved
    pub call_id: String,
    /// The requested tool name
    pub name: Option<String>,
    pub outcome: CallOutcome,
}

impl CallResult {
    /// Check if this is an error of either kind
    pub fn is_error(&self) -> bool {
        !matches!(self.outcome, CallOutcome::Success(_))
    }

    fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<unnamed>")
    }

    /// Text of the tool message this result becomes
    pub fn content(&self) -> String {
        match &self.outcome {
            CallOutcome::Success(value) => value.clone(),
            CallOutcome::UnknownCapability => format!("Unknown tool: {}", self.display_name()),
            CallOutcome::InvocationError(message) => {
                format!("Error calling {}: {}", self.display_name(), message)
            }
        }
    }

    /// Convert into a tool-role message
    pub fn into_message(self) -> Message {
        let content = self.content();
        Message::tool(self.call_id, content)
    }
}

/// Dispatch every request in order. One result per request, same order.
pub async fn dispatch(requests: &[CallRequest], registry: &ToolRegistry) -> Vec<CallResult> {
    let mut results = Vec::with_capacity(requests.len());
    for (index, request) in requests.iter().enumerate() {
        results.push(dispatch_call(index, request, registry).await);
    }
    results
}

/// Dispatch the request at position `index` of its batch
pub async fn dispatch_call(index: usize, request: &CallRequest, registry: &ToolRegistry) -> CallResult {
    let tool = request
        .name
        .as_deref()
        .and_then(|name| registry.lookup(name).map(|tool| (name, tool)));

    let Some((name, tool)) = tool else {
        tracing::warn!(
            target: "toolchat.tools",
            index,
            name = request.name.as_deref().unwrap_or(""),
            "call to unknown tool"
        );
        return CallResult {
            call_id: format!("unknown_{}", index),
            name: request.name.clone(),
            outcome: CallOutcome::UnknownCapability,
        };
    };

    let call_id = format!("{}_{}", name, index);
    let outcome = match bind_arguments(&request.arguments) {
        Ok(arguments) => match AssertUnwindSafe(tool.invoke(&arguments)).catch_unwind().await {
            Ok(Ok(value)) => CallOutcome::Success(stringify_value(&value)),
            Ok(Err(e)) => CallOutcome::InvocationError(e.to_string()),
            Err(panic) => CallOutcome::InvocationError(format!(
                "tool panicked: {}",
                panic_message(panic.as_ref())
            )),
        },
        Err(e) => CallOutcome::InvocationError(e.to_string()),
    };

    match &outcome {
        CallOutcome::InvocationError(message) => tracing::debug!(
            target: "toolchat.tools",
            call_id = %call_id,
            error = %message,
            "tool invocation failed"
        ),
        _ => tracing::debug!(target: "toolchat.tools", call_id = %call_id, "tool invoked"),
    }

    CallResult {
        call_id,
        name: request.name.clone(),
        outcome,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

/// Turn raw call arguments into keyword bindings.
///
/// Objects bind directly, `null` binds nothing, and a string is decoded as
/// a JSON object (some models double-encode). Anything else is rejected.
pub fn bind_arguments(arguments: &Value) -> Result<ToolArguments> {
    match arguments {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(ToolArguments::new()),
        Value::String(s) if s.trim().is_empty() => Ok(ToolArguments::new()),
        Value::String(s) => match serde_json::from_str::<Value>(s) {
            Ok(Value::Object(map)) => Ok(map),
            _ => Err(ToolchatError::InvalidInput(
                "arguments must be a JSON object".to_string(),
            )),
        },
        other => Err(ToolchatError::InvalidInput(format!(
            "arguments must be a JSON object, got {}",
            json_kind(other)
        ))),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Render a tool's return value as tool-message text.
///
/// Strings are verbatim, integers print plainly, whole floats keep one
/// decimal (`5.0`), everything else is compact JSON.
pub fn stringify_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else if let Some(f) = n.as_f64() {
                format_float(f)
            } else {
                n.to_string()
            }
        }
        other => other.to_string(),
    }
}

fn format_float(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{:.1}", f)
    } else {
        f.to_string()
    }
}
