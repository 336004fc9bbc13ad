// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Tool definition types
//!
//! These types describe a tool to the model: its name, what it does, and the
//! JSON-schema shape of its arguments.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tool definition as advertised in the prompt catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: ToolInputSchema,
}

/// JSON schema for tool arguments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub properties: Value,
    #[serde(default)]
    pub required: Vec<String>,
}

impl ToolInputSchema {
    /// Whether the schema declares no properties
    pub fn is_empty(&self) -> bool {
        match &self.properties {
            Value::Object(map) => map.is_empty(),
            Value::Null => true,
            _ => false,
        }
    }
}

impl ToolDefinition {
    /// Catalog entry: `{name, description, parameters: {type, properties, required}}`
    pub fn to_catalog_entry(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "description": self.description,
            "parameters": {
                "type": self.input_schema.schema_type,
                "properties": self.input_schema.properties,
                "required": self.input_schema.required,
            }
        })
    }
}

/// Helper to create a tool input schema
pub struct SchemaBuilder {
    properties: serde_json::Map<String, Value>,
    required: Vec<String>,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            properties: serde_json::Map::new(),
            required: vec![],
        }
    }

    fn property(mut self, name: &str, spec: Value, required: bool) -> Self {
        self.properties.insert(name.to_string(), spec);
        if required {
            self.required.push(name.to_string());
        }
        self
    }

    /// Add a number property
    pub fn number(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "number", "description": description }),
            required,
        )
    }

    /// Add a string property
    pub fn string(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "string", "description": description }),
            required,
        )
    }

    /// Add an integer property
    pub fn integer(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "integer", "description": description }),
            required,
        )
    }

    /// Add a boolean property
    pub fn boolean(self, name: &str, description: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({ "type": "boolean", "description": description }),
            required,
        )
    }

    /// Add an array property
    pub fn array(self, name: &str, description: &str, item_type: &str, required: bool) -> Self {
        self.property(
            name,
            serde_json::json!({
                "type": "array",
                "description": description,
                "items": { "type": item_type }
            }),
            required,
        )
    }

    /// Build the schema
    pub fn build(self) -> ToolInputSchema {
        ToolInputSchema {
            schema_type: "object".to_string(),
            properties: Value::Object(self.properties),
            required: self.required,
        }
    }
}

impl Default for SchemaBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_builder_empty() {
        let schema = SchemaBuilder::default().build();
        assert_eq!(schema.schema_type, "object");
        assert!(schema.is_empty());
        assert!(schema.required.is_empty());
    }

    #[test]
    fn test_schema_builder_number_required() {
        let schema = SchemaBuilder::new()
            .number("a", "First number", true)
            .build();

        assert_eq!(schema.properties["a"]["type"], "number");
        assert_eq!(schema.properties["a"]["description"], "First number");
        assert_eq!(schema.required, vec!["a"]);
        assert!(!schema.is_empty());
    }

    #[test]
    fn test_schema_builder_optional_not_required() {
        let schema = SchemaBuilder::new()
            .string("name", "The name field", false)
            .integer("count", "How many", false)
            .boolean("flag", "A flag", false)
            .build();

        assert!(schema.required.is_empty());
        assert_eq!(schema.properties["name"]["type"], "string");
        assert_eq!(schema.properties["count"]["type"], "integer");
        assert_eq!(schema.properties["flag"]["type"], "boolean");
    }

    #[test]
    fn test_schema_builder_array() {
        let schema = SchemaBuilder::new()
            .array("values", "Numbers to sum", "number", true)
            .build();

        assert_eq!(schema.properties["values"]["type"], "array");
        assert_eq!(schema.properties["values"]["items"]["type"], "number");
    }

    #[test]
    fn test_input_schema_serializes_type_key() {
        let schema = SchemaBuilder::new().number("a", "A", true).build();
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["type"], "object");
        assert!(json.get("schema_type").is_none());
    }

    #[test]
    fn test_catalog_entry_shape() {
        let definition = ToolDefinition {
            name: "add_numbers".to_string(),
            description: "Add two numbers".to_string(),
            input_schema: SchemaBuilder::new()
                .number("a", "First", true)
                .number("b", "Second", true)
                .build(),
        };

        let entry = definition.to_catalog_entry();
        assert_eq!(entry["name"], "add_numbers");
        assert_eq!(entry["description"], "Add two numbers");
        assert_eq!(entry["parameters"]["type"], "object");
        assert_eq!(entry["parameters"]["required"], serde_json::json!(["a", "b"]));
        assert!(entry["parameters"]["properties"]["b"].is_object());
    }
}
