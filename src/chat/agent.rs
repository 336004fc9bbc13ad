// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Agent loop state machine
//!
//! Pure decision logic for the generate/dispatch loop, kept apart from the
//! I/O in [`crate::chat::engine`] so termination can be tested directly.

use crate::chat::parser;
use crate::llm::message::Message;
use crate::tools::CallRequest;

/// Default cap on messages appended during one user turn
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Smallest usable cap: the user message plus one reply
pub const MIN_MAX_ITERATIONS: usize = 2;

/// Why a turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model replied without calling a tool
    FinalAnswer,
    /// The turn hit the message cap
    IterationCap,
}

/// What the loop does after a generation
#[derive(Debug, Clone, PartialEq)]
pub enum LoopDecision {
    /// Run these calls, then generate again
    Dispatch(Vec<CallRequest>),
    /// Stop the turn
    Terminal(StopReason),
}

/// States of the turn loop
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Generating,
    Dispatching(Vec<CallRequest>),
    Terminal(StopReason),
}

impl From<LoopDecision> for LoopState {
    fn from(decision: LoopDecision) -> Self {
        match decision {
            LoopDecision::Dispatch(calls) => LoopState::Dispatching(calls),
            LoopDecision::Terminal(reason) => LoopState::Terminal(reason),
        }
    }
}

/// Decide whether the turn continues.
///
/// `turn_messages` are the messages appended since the turn began, user
/// message included. The turn ends when it already holds `max_iterations`
/// messages, when the latest assistant reply contains no calls, or when
/// dispatching the batch would push it past the cap. A batch is only
/// started if all of its results fit.
pub fn should_continue(turn_messages: &[Message], max_iterations: usize) -> LoopDecision {
    if turn_messages.len() >= max_iterations {
        return LoopDecision::Terminal(StopReason::IterationCap);
    }

    let calls = match turn_messages.last() {
        Some(message) if message.is_assistant() => parser::parse(&message.content),
        _ => Vec::new(),
    };

    if calls.is_empty() {
        return LoopDecision::Terminal(StopReason::FinalAnswer);
    }

    if turn_messages.len() + calls.len() > max_iterations {
        tracing::warn!(
            target: "toolchat.chat.agent",
            messages = turn_messages.len(),
            pending_calls = calls.len(),
            max_iterations,
            "tool batch would exceed iteration cap"
        );
        return LoopDecision::Terminal(StopReason::IterationCap);
    }

    LoopDecision::Dispatch(calls)
}
