// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock completion engine for testing
//!
//! Returns scripted completions in order (repeating the last one once the
//! script runs out), records every prompt it receives, and can be told to
//! fail so the fail-closed paths can be exercised without a model.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::{Result, ToolchatError};
use crate::llm::provider::{CompletionEngine, GenerationParams, TextStream};

/// One scripted completion
#[derive(Clone, Debug, PartialEq)]
pub enum MockResponse {
    /// Return this text
    Text(String),
    /// Fail with an engine error carrying this message
    Failure(String),
}

impl MockResponse {
    /// A completion that asks for one tool call in a fenced JSON block
    pub fn tool_call(name: &str, arguments: serde_json::Value) -> Self {
        let body = serde_json::json!({
            "tool_calls": [{ "name": name, "arguments": arguments }]
        });
        MockResponse::Text(format!("```json\n{}\n```", body))
    }
}

/// A scripted completion engine
#[derive(Clone)]
pub struct MockEngine {
    name: String,
    responses: Arc<Mutex<Vec<MockResponse>>>,
    call_count: Arc<AtomicUsize>,
    recorded_prompts: Arc<Mutex<Vec<String>>>,
    recorded_params: Arc<Mutex<Vec<GenerationParams>>>,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!(target: "toolchat.llm.mock", "mock engine lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockEngine {
    /// Create a mock engine that answers "Mock response"
    pub fn new() -> Self {
        Self {
            name: "mock".to_string(),
            responses: Arc::new(Mutex::new(vec![MockResponse::Text(
                "Mock response".to_string(),
            )])),
            call_count: Arc::new(AtomicUsize::new(0)),
            recorded_prompts: Arc::new(Mutex::new(vec![])),
            recorded_params: Arc::new(Mutex::new(vec![])),
        }
    }

    /// Always answer with `text`
    pub fn with_response(self, text: impl Into<String>) -> Self {
        self.with_script(vec![MockResponse::Text(text.into())])
    }

    /// Answer with these texts in order
    pub fn with_responses<S: Into<String>>(self, texts: Vec<S>) -> Self {
        self.with_script(
            texts
                .into_iter()
                .map(|t| MockResponse::Text(t.into()))
                .collect(),
        )
    }

    /// Replace the whole script
    pub fn with_script(self, script: Vec<MockResponse>) -> Self {
        *lock(&self.responses) = script;
        self
    }

    /// Fail every generation
    pub fn failing(self, message: impl Into<String>) -> Self {
        self.with_script(vec![MockResponse::Failure(message.into())])
    }

    /// Number of generations requested so far
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every prompt received, oldest first
    pub fn recorded_prompts(&self) -> Vec<String> {
        lock(&self.recorded_prompts).clone()
    }

    /// The most recent prompt
    pub fn last_prompt(&self) -> Option<String> {
        lock(&self.recorded_prompts).last().cloned()
    }

    /// Sampling parameters of every generation, oldest first
    pub fn recorded_params(&self) -> Vec<GenerationParams> {
        lock(&self.recorded_params).clone()
    }

    /// Reset call count and recordings
    pub fn reset(&self) {
        self.call_count.store(0, Ordering::SeqCst);
        lock(&self.recorded_prompts).clear();
        lock(&self.recorded_params).clear();
    }

    fn next_response(&self, prompt: &str, params: &GenerationParams) -> MockResponse {
        let count = self.call_count.fetch_add(1, Ordering::SeqCst);
        lock(&self.recorded_prompts).push(prompt.to_string());
        lock(&self.recorded_params).push(params.clone());

        let responses = lock(&self.responses);
        if responses.is_empty() {
            MockResponse::Text(String::new())
        } else {
            responses[count.min(responses.len() - 1)].clone()
        }
    }
}

#[async_trait]
impl CompletionEngine for MockEngine {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        match self.next_response(prompt, params) {
            MockResponse::Text(text) => Ok(text),
            MockResponse::Failure(message) => Err(ToolchatError::Engine(message)),
        }
    }

    /// Streams the scripted text split after each whitespace run
    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TextStream> {
        let text = match self.next_response(prompt, params) {
            MockResponse::Text(text) => text,
            MockResponse::Failure(message) => return Err(ToolchatError::Engine(message)),
        };

        let pieces: Vec<Result<String>> = text
            .split_inclusive(char::is_whitespace)
            .map(|piece| Ok(piece.to_string()))
            .collect();

        Ok(Box::pin(futures::stream::iter(pieces)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_default_response() {
        let engine = MockEngine::new();
        let text = engine
            .generate("prompt", &GenerationParams::default())
            .await
            .unwrap();
        assert_eq!(text, "Mock response");
        assert_eq!(engine.call_count(), 1);
    }

    #[tokio::test]
    async fn test_scripted_responses_repeat_last() {
        let engine = MockEngine::new().with_responses(vec!["first", "second"]);
        let params = GenerationParams::default();

        assert_eq!(engine.generate("a", &params).await.unwrap(), "first");
        assert_eq!(engine.generate("b", &params).await.unwrap(), "second");
        assert_eq!(engine.generate("c", &params).await.unwrap(), "second");
        assert_eq!(engine.recorded_prompts(), vec!["a", "b", "c"]);
        assert_eq!(engine.last_prompt().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_failure_response() {
        let engine = MockEngine::new().failing("out of memory");
        let err = engine
            .generate("prompt", &GenerationParams::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of memory"));
    }

    #[tokio::test]
    async fn test_stream_splits_on_whitespace() {
        let engine = MockEngine::new().with_response("one two  three");
        let stream = engine
            .generate_stream("prompt", &GenerationParams::default())
            .await
            .unwrap();
        let pieces: Vec<String> = stream.map(|p| p.unwrap()).collect().await;

        assert_eq!(pieces.concat(), "one two  three");
        assert!(pieces.len() > 1);
    }

    #[test]
    fn test_tool_call_response_is_fenced_json() {
        let MockResponse::Text(text) =
            MockResponse::tool_call("add_numbers", serde_json::json!({"a": 2, "b": 3}))
        else {
            panic!("expected text response");
        };
        assert!(text.starts_with("```json\n"));
        assert!(text.contains("\"tool_calls\""));
        assert!(text.ends_with("\n```"));
    }

    #[tokio::test]
    async fn test_reset() {
        let engine = MockEngine::new();
        engine
            .generate("prompt", &GenerationParams::default())
            .await
            .unwrap();
        engine.reset();
        assert_eq!(engine.call_count(), 0);
        assert!(engine.recorded_prompts().is_empty());
        assert!(engine.recorded_params().is_empty());
    }
}
