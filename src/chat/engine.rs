// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Conversation loop.
//!
//! [`ChatEngine`] owns everything a turn needs (completion adapter, tool
//! registry, prompt encoder, sampling parameters and the iteration cap) and
//! drives one user turn through generate → parse → dispatch → generate until
//! the model answers without a call or the cap is reached. Frontends watch
//! progress through an [`AgentLoopObserver`].

use std::sync::Arc;

use serde_json::Value;

use crate::chat::agent::{should_continue, LoopState, StopReason, DEFAULT_MAX_ITERATIONS};
use crate::chat::prompt::PromptEncoder;
use crate::error::{Result, ToolchatError};
use crate::llm::message::{Conversation, Message};
use crate::llm::provider::{CompletionAdapter, CompletionEngine, GenerationParams};
use crate::tools::{dispatch_call, CallResult, Tool, ToolRegistry};

/// Output hooks for the conversation loop.
///
/// Frontends can implement this trait to render streamed text and tool
/// activity. Every hook defaults to doing nothing.
///
/// Hooks fired while the turn is still running (deltas, generations, tool
/// invocations and results) are reported after the conversation has been
/// updated, and their errors are logged rather than returned.
pub trait AgentLoopObserver: Send {
    /// A streamed fragment of the current generation
    fn on_text_delta(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    /// A generation finished; `text` is what gets stored
    fn on_generation_complete(&mut self, _text: &str) -> Result<()> {
        Ok(())
    }

    fn on_tool_invocation(&mut self, _tool_name: Option<&str>, _arguments: &Value) -> Result<()> {
        Ok(())
    }

    fn on_tool_result(&mut self, _result: &CallResult) -> Result<()> {
        Ok(())
    }

    /// The turn was cut off by the message cap
    fn on_iteration_cap(&mut self, _max_iterations: usize) -> Result<()> {
        Ok(())
    }

    fn on_agent_complete(&mut self, _summary: &TurnSummary) -> Result<()> {
        Ok(())
    }
}

/// No-op observer for callers that don't need output hooks.
#[derive(Debug, Default)]
pub struct NoopAgentLoopObserver;

impl AgentLoopObserver for NoopAgentLoopObserver {}

/// What one user turn did
#[derive(Debug, Clone, PartialEq)]
pub struct TurnSummary {
    /// Raw text of the last assistant message of the turn
    pub final_text: String,
    pub stop_reason: StopReason,
    /// Completions requested
    pub generations: usize,
    /// Calls dispatched (any outcome)
    pub tool_calls: usize,
    /// Messages appended to the conversation, user message included
    pub messages_appended: usize,
}

/// Shared context for running turns
pub struct ChatEngine {
    adapter: CompletionAdapter,
    registry: ToolRegistry,
    encoder: PromptEncoder,
    params: GenerationParams,
    max_iterations: usize,
    stream: bool,
}

impl std::fmt::Debug for ChatEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatEngine")
            .field("adapter", &self.adapter)
            .field("registry", &self.registry)
            .field("encoder", &self.encoder)
            .field("max_iterations", &self.max_iterations)
            .field("stream", &self.stream)
            .finish()
    }
}

impl ChatEngine {
    /// Engine with default encoder, sampling and a cap of 20 messages
    pub fn new(engine: Arc<dyn CompletionEngine>, registry: ToolRegistry) -> Self {
        Self {
            adapter: CompletionAdapter::new(engine),
            registry,
            encoder: PromptEncoder::default(),
            params: GenerationParams::default(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
            stream: false,
        }
    }

    /// Set the prompt encoder. Stop sequences follow its template.
    pub fn with_encoder(mut self, encoder: PromptEncoder) -> Self {
        self.params.stop = encoder
            .template()
            .stop_sequences()
            .iter()
            .map(|s| s.to_string())
            .collect();
        self.encoder = encoder;
        self
    }

    /// Set sampling parameters (including stop sequences)
    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    /// Set the per-turn message cap
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Stream generations through [`AgentLoopObserver::on_text_delta`]
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn engine_name(&self) -> &str {
        self.adapter.engine_name()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn params(&self) -> &GenerationParams {
        &self.params
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Replace the bound tool set
    pub fn bind_tools(&mut self, tools: Vec<Arc<dyn Tool>>) {
        self.registry.register(tools);
    }

    /// Run one user turn to completion.
    ///
    /// Appends the user message, then alternates generation and dispatch.
    /// Engine, tool and progress-hook failures never end the turn early.
    /// Blank input and errors from `on_iteration_cap` or `on_agent_complete`
    /// are returned, once every message of the turn has been appended.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        user_text: &str,
        observer: &mut dyn AgentLoopObserver,
    ) -> Result<TurnSummary> {
        if user_text.trim().is_empty() {
            return Err(ToolchatError::InvalidInput(
                "user message is empty".to_string(),
            ));
        }

        let turn_start = conversation.len();
        conversation.push(Message::user(user_text));

        tracing::info!(
            target: "toolchat.chat.engine",
            engine = self.adapter.engine_name(),
            stream = self.stream,
            history = turn_start,
            max_iterations = self.max_iterations,
            "turn start"
        );

        let mut state = LoopState::Generating;
        let mut generations = 0usize;
        let mut tool_calls = 0usize;

        let stop_reason = loop {
            state = match state {
                LoopState::Generating => {
                    if conversation.since(turn_start).len() >= self.max_iterations {
                        LoopState::Terminal(StopReason::IterationCap)
                    } else {
                        let text = self.generate(conversation, observer).await;
                        generations += 1;
                        conversation.push(Message::assistant(text.clone()));
                        log_hook_error(
                            "on_generation_complete",
                            observer.on_generation_complete(&text),
                        );

                        should_continue(conversation.since(turn_start), self.max_iterations).into()
                    }
                }
                LoopState::Dispatching(calls) => {
                    tracing::debug!(
                        target: "toolchat.chat.engine",
                        generation = generations,
                        calls = calls.len(),
                        "dispatching tool calls"
                    );

                    for (index, call) in calls.iter().enumerate() {
                        log_hook_error(
                            "on_tool_invocation",
                            observer.on_tool_invocation(call.name.as_deref(), &call.arguments),
                        );
                        let result = dispatch_call(index, call, &self.registry).await;
                        conversation.push(result.clone().into_message());
                        tool_calls += 1;
                        log_hook_error("on_tool_result", observer.on_tool_result(&result));
                    }

                    LoopState::Generating
                }
                LoopState::Terminal(reason) => break reason,
            };
        };

        if stop_reason == StopReason::IterationCap {
            tracing::warn!(
                target: "toolchat.chat.engine",
                max_iterations = self.max_iterations,
                generations,
                tool_calls,
                "turn stopped at iteration cap"
            );
            observer.on_iteration_cap(self.max_iterations)?;
        }

        let summary = TurnSummary {
            final_text: conversation
                .since(turn_start)
                .iter()
                .rev()
                .find(|m| m.is_assistant())
                .map(|m| m.content.clone())
                .unwrap_or_default(),
            stop_reason,
            generations,
            tool_calls,
            messages_appended: conversation.len() - turn_start,
        };

        tracing::info!(
            target: "toolchat.chat.engine",
            ?stop_reason,
            generations,
            tool_calls,
            messages_appended = summary.messages_appended,
            "turn complete"
        );

        observer.on_agent_complete(&summary)?;
        Ok(summary)
    }

    async fn generate(
        &self,
        conversation: &Conversation,
        observer: &mut dyn AgentLoopObserver,
    ) -> String {
        let prompt = self.encoder.encode(conversation.messages(), &self.registry);

        if !self.stream {
            return self.adapter.generate(&prompt, &self.params, None).await;
        }

        let mut on_delta = |piece: &str| {
            if let Err(e) = observer.on_text_delta(piece) {
                tracing::debug!(target: "toolchat.chat.engine", error = %e, "text delta hook failed");
            }
        };
        self.adapter
            .generate(&prompt, &self.params, Some(&mut on_delta))
            .await
    }
}

fn log_hook_error(hook: &'static str, result: Result<()>) {
    if let Err(e) = result {
        tracing::warn!(target: "toolchat.chat.engine", hook, error = %e, "observer hook failed");
    }
}
