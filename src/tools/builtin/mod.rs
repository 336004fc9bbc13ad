// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Built-in tools for toolchat

mod math;

pub use math::{MathOp, MathTool};

use std::sync::Arc;

use super::Tool;

/// The arithmetic catalog: add, multiply, subtract, divide
pub fn math_tools() -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(MathTool::new(MathOp::Add)),
        Arc::new(MathTool::new(MathOp::Multiply)),
        Arc::new(MathTool::new(MathOp::Subtract)),
        Arc::new(MathTool::new(MathOp::Divide)),
    ]
}
