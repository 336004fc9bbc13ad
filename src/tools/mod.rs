// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool system for toolchat
//!
//! A tool is a named capability the model can ask for by writing a
//! structured call into its reply. Tools declare an optional argument schema
//! that is rendered into the prompt catalog; the [`executor`] resolves parsed
//! calls against a [`ToolRegistry`] and turns outcomes into tool messages.

pub mod builtin;
pub mod definition;
pub mod executor;

pub use definition::*;
pub use executor::*;

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;

/// Arguments handed to a tool: keyword-style bindings from the call request
pub type ToolArguments = Map<String, Value>;

/// Trait for implementing tools
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name the model refers to the tool by
    fn name(&self) -> &str;

    /// One-line description shown in the catalog
    fn description(&self) -> &str;

    /// Argument schema; tools without one are left out of the catalog
    fn input_schema(&self) -> Option<ToolInputSchema>;

    /// Run the tool
    async fn invoke(&self, arguments: &ToolArguments) -> Result<Value>;

    /// Catalog definition, if the tool has a non-empty schema
    fn definition(&self) -> Option<ToolDefinition> {
        let schema = self.input_schema().filter(|s| !s.is_empty())?;
        Some(ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: schema,
        })
    }
}

type BoxedHandler =
    Arc<dyn Fn(ToolArguments) -> Pin<Box<dyn Future<Output = Result<Value>> + Send>> + Send + Sync>;

/// A tool built from a name, description, schema and async closure
pub struct FunctionTool {
    name: String,
    description: String,
    schema: Option<ToolInputSchema>,
    handler: BoxedHandler,
}

impl FunctionTool {
    /// Create a tool from an async closure
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        schema: Option<ToolInputSchema>,
        handler: F,
    ) -> Self
    where
        F: Fn(ToolArguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            schema,
            handler: Arc::new(move |args| Box::pin(handler(args))),
        }
    }
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("has_schema", &self.schema.is_some())
            .finish()
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Option<ToolInputSchema> {
        self.schema.clone()
    }

    async fn invoke(&self, arguments: &ToolArguments) -> Result<Value> {
        (self.handler)(arguments.clone()).await
    }
}

/// Registry of available tools
///
/// Ordered; lookups return the first tool with a matching name.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `tools`
    pub fn with_tools(tools: Vec<Arc<dyn Tool>>) -> Self {
        Self { tools }
    }

    /// Create a registry with the built-in arithmetic tools
    pub fn with_builtins() -> Self {
        Self::with_tools(builtin::math_tools())
    }

    /// Replace the active tool set
    pub fn register(&mut self, tools: Vec<Arc<dyn Tool>>) {
        tracing::debug!(
            target: "toolchat.tools",
            previous = self.tools.len(),
            count = tools.len(),
            "tool set replaced"
        );
        self.tools = tools;
    }

    /// Find a tool by exact name
    pub fn lookup(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    /// Definitions of every tool with a non-empty schema, in registry order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().filter_map(|t| t.definition()).collect()
    }

    /// Render the catalog as pretty-printed JSON for the system prompt
    pub fn render_catalog(&self) -> String {
        let entries: Vec<Value> = self
            .definitions()
            .iter()
            .map(ToolDefinition::to_catalog_entry)
            .collect();
        serde_json::to_string_pretty(&entries).unwrap_or_else(|_| "[]".to_string())
    }

    /// List all tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Get the number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
