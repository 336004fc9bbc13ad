// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! toolchat - conversational assistant over a local LLM with JSON tool calling.
//!
//! The model has no native function calling. Tools are described in the
//! system prompt, the model replies with a `{"tool_calls": [...]}` JSON block
//! when it wants one, and the loop runs the calls and feeds the results back
//! until the model answers in plain text.
//!
//! Architecture highlights:
//! - `chat`: prompt encoding, call parsing, the turn state machine and engine
//! - `llm`: message model, completion engine trait, llama-server and llama.cpp engines
//! - `tools`: tool trait, registry, dispatcher and the arithmetic catalog
//! - `config`: layered settings (file, environment, flags)
//! - `cli`: command-line arguments for the `toolchat` binary

pub mod chat;
pub mod cli;
pub mod config;
pub mod error;
pub mod llm;
pub mod tools;

pub use error::{Result, ToolchatError};
