// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Chat loop
//!
//! Prompt encoding, call parsing, the turn state machine and the engine that
//! ties them to a completion backend and a tool registry.

pub mod agent;
pub mod display;
pub mod engine;
pub mod input_parser;
pub mod parser;
pub mod prompt;

pub use agent::{should_continue, LoopDecision, LoopState, StopReason};
pub use engine::{AgentLoopObserver, ChatEngine, NoopAgentLoopObserver, TurnSummary};
pub use prompt::{PromptEncoder, PromptTemplate};
