// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Arithmetic tools
//!
//! Four binary operations on floating point numbers. Arguments are bound by
//! keyword (`a`, `b`) and results are always floats.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{Result, ToolchatError};
use crate::tools::{SchemaBuilder, Tool, ToolArguments, ToolInputSchema};

/// The operation a [`MathTool`] performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Add,
    Multiply,
    Subtract,
    Divide,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MathArgs {
    a: f64,
    b: f64,
}

/// Binary arithmetic tool
#[derive(Debug, Clone, Copy)]
pub struct MathTool {
    op: MathOp,
}

impl MathTool {
    pub fn new(op: MathOp) -> Self {
        Self { op }
    }

    fn apply(&self, a: f64, b: f64) -> Result<f64> {
        match self.op {
            MathOp::Add => Ok(a + b),
            MathOp::Multiply => Ok(a * b),
            MathOp::Subtract => Ok(a - b),
            MathOp::Divide if b == 0.0 => {
                Err(ToolchatError::ToolExecution("Division by zero".to_string()))
            }
            MathOp::Divide => Ok(a / b),
        }
    }
}

#[async_trait]
impl Tool for MathTool {
    fn name(&self) -> &str {
        match self.op {
            MathOp::Add => "add_numbers",
            MathOp::Multiply => "multiply_numbers",
            MathOp::Subtract => "subtract_numbers",
            MathOp::Divide => "divide_numbers",
        }
    }

    fn description(&self) -> &str {
        match self.op {
            MathOp::Add => "Add two floating point numbers and return the result.",
            MathOp::Multiply => "Multiply two floating point numbers and return the result.",
            MathOp::Subtract => "Subtract two floating point numbers and return the result.",
            MathOp::Divide => "Divide two floating point numbers and return the result.",
        }
    }

    fn input_schema(&self) -> Option<ToolInputSchema> {
        let (a, b) = match self.op {
            MathOp::Divide => (
                "The dividend (the number being divided).",
                "The divisor (the number to divide by).",
            ),
            _ => (
                "The first floating point number.",
                "The second floating point number.",
            ),
        };
        Some(
            SchemaBuilder::new()
                .number("a", a, true)
                .number("b", b, true)
                .build(),
        )
    }

    async fn invoke(&self, arguments: &ToolArguments) -> Result<Value> {
        let args: MathArgs = serde_json::from_value(Value::Object(arguments.clone()))
            .map_err(|e| ToolchatError::InvalidInput(e.to_string()))?;

        let result = self.apply(args.a, args.b)?;
        serde_json::Number::from_f64(result)
            .map(Value::Number)
            .ok_or_else(|| ToolchatError::ToolExecution(format!("Result is not finite: {}", result)))
    }
}
