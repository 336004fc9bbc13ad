// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Completion engine trait and the fail-closed adapter around it
//!
//! Engines are plain text-in / text-out completion functions. The
//! [`CompletionAdapter`] is the only thing the conversation loop talks to:
//! it concatenates streamed fragments, forwards them to an optional display
//! callback, and turns every engine failure into [`GENERATION_APOLOGY`] so a
//! broken generation never aborts a turn.

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;

use crate::error::Result;

/// Reply substituted for any failed generation
pub const GENERATION_APOLOGY: &str = "Sorry, I encountered an error processing your request.";

/// Default maximum number of generated tokens
pub const DEFAULT_MAX_TOKENS: u32 = 1024;
/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
/// Default nucleus sampling threshold
pub const DEFAULT_TOP_P: f32 = 0.9;
/// Default repetition penalty
pub const DEFAULT_REPEAT_PENALTY: f32 = 1.1;

/// Stream of generated text fragments
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Main trait for completion engines
#[async_trait]
pub trait CompletionEngine: Send + Sync {
    /// Engine name for logs (e.g., "llama-server", "llama.cpp")
    fn name(&self) -> &str;

    /// Generate a completion for a raw prompt
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;

    /// Generate a completion as a stream of text fragments.
    ///
    /// Engines without incremental delivery get a single-fragment stream.
    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TextStream> {
        let text = self.generate(prompt, params).await?;
        Ok(Box::pin(futures::stream::iter(vec![Ok(text)])))
    }
}

/// Sampling parameters for one generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum tokens to generate
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Nucleus sampling threshold
    pub top_p: f32,
    /// Repetition penalty
    pub repeat_penalty: f32,
    /// Generation halts when any of these is produced
    pub stop: Vec<String>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            top_p: DEFAULT_TOP_P,
            repeat_penalty: DEFAULT_REPEAT_PENALTY,
            stop: crate::chat::prompt::PromptTemplate::default()
                .stop_sequences()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl GenerationParams {
    /// Set the maximum tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set top-p
    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = top_p;
        self
    }

    /// Set the repetition penalty
    pub fn with_repeat_penalty(mut self, repeat_penalty: f32) -> Self {
        self.repeat_penalty = repeat_penalty;
        self
    }

    /// Replace the stop sequences
    pub fn with_stop(mut self, stop: Vec<String>) -> Self {
        self.stop = stop;
        self
    }
}

/// Uniform, fail-closed front for a [`CompletionEngine`]
#[derive(Clone)]
pub struct CompletionAdapter {
    engine: Arc<dyn CompletionEngine>,
}

impl std::fmt::Debug for CompletionAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompletionAdapter")
            .field("engine", &self.engine.name())
            .finish()
    }
}

impl CompletionAdapter {
    /// Wrap an engine
    pub fn new(engine: Arc<dyn CompletionEngine>) -> Self {
        Self { engine }
    }

    /// Name of the wrapped engine
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Generate a completion, never failing.
    ///
    /// With `on_delta` set, fragments are delivered to it as they arrive; the
    /// return value is always the full, trimmed text. Any engine error, at
    /// start or mid-stream, yields [`GENERATION_APOLOGY`].
    pub async fn generate(
        &self,
        prompt: &str,
        params: &GenerationParams,
        on_delta: Option<&mut (dyn FnMut(&str) + Send + '_)>,
    ) -> String {
        let result = match on_delta {
            Some(callback) => self.collect_stream(prompt, params, callback).await,
            None => self.engine.generate(prompt, params).await,
        };

        match result {
            Ok(text) => {
                tracing::debug!(
                    target: "toolchat.llm",
                    engine = self.engine.name(),
                    prompt_chars = prompt.len(),
                    output_chars = text.len(),
                    "generation complete"
                );
                text.trim().to_string()
            }
            Err(e) => {
                tracing::error!(
                    target: "toolchat.llm",
                    engine = self.engine.name(),
                    error = %e,
                    "generation failed; substituting apology"
                );
                GENERATION_APOLOGY.to_string()
            }
        }
    }

    async fn collect_stream(
        &self,
        prompt: &str,
        params: &GenerationParams,
        callback: &mut (dyn FnMut(&str) + Send + '_),
    ) -> Result<String> {
        let mut stream = self.engine.generate_stream(prompt, params).await?;
        let mut text = String::new();

        while let Some(piece) = stream.next().await {
            let piece = piece?;
            if piece.is_empty() {
                continue;
            }
            callback(&piece);
            text.push_str(&piece);
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ToolchatError;

    struct FixedEngine(&'static str);

    #[async_trait]
    impl CompletionEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl CompletionEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            Err(ToolchatError::Engine("weights exploded".to_string()))
        }
    }

    struct BrokenStreamEngine;

    #[async_trait]
    impl CompletionEngine for BrokenStreamEngine {
        fn name(&self) -> &str {
            "broken-stream"
        }

        async fn generate(&self, _prompt: &str, _params: &GenerationParams) -> Result<String> {
            Ok("unused".to_string())
        }

        async fn generate_stream(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> Result<TextStream> {
            Ok(Box::pin(futures::stream::iter(vec![
                Ok("partial ".to_string()),
                Err(ToolchatError::Engine("connection reset".to_string())),
            ])))
        }
    }

    #[test]
    fn test_generation_params_default() {
        let params = GenerationParams::default();
        assert_eq!(params.max_tokens, 1024);
        assert!((params.temperature - 0.7).abs() < f32::EPSILON);
        assert!((params.top_p - 0.9).abs() < f32::EPSILON);
        assert!((params.repeat_penalty - 1.1).abs() < f32::EPSILON);
        assert_eq!(params.stop, vec!["<|eot_id|>", "<|end_of_text|>"]);
    }

    #[test]
    fn test_generation_params_builder() {
        let params = GenerationParams::default()
            .with_max_tokens(64)
            .with_temperature(0.0)
            .with_top_p(0.5)
            .with_repeat_penalty(1.3)
            .with_stop(vec!["END".to_string()]);

        assert_eq!(params.max_tokens, 64);
        assert_eq!(params.temperature, 0.0);
        assert_eq!(params.top_p, 0.5);
        assert_eq!(params.repeat_penalty, 1.3);
        assert_eq!(params.stop, vec!["END"]);
    }

    #[tokio::test]
    async fn test_adapter_trims_output() {
        let adapter = CompletionAdapter::new(Arc::new(FixedEngine("  hello world \n")));
        let text = adapter
            .generate("prompt", &GenerationParams::default(), None)
            .await;
        assert_eq!(text, "hello world");
    }

    #[tokio::test]
    async fn test_adapter_fails_closed() {
        let adapter = CompletionAdapter::new(Arc::new(FailingEngine));
        let text = adapter
            .generate("prompt", &GenerationParams::default(), None)
            .await;
        assert_eq!(text, GENERATION_APOLOGY);
    }

    #[tokio::test]
    async fn test_adapter_streaming_returns_full_text() {
        let adapter = CompletionAdapter::new(Arc::new(FixedEngine("streamed reply")));
        let mut seen = Vec::new();
        let mut on_delta = |piece: &str| seen.push(piece.to_string());

        let text = adapter
            .generate("prompt", &GenerationParams::default(), Some(&mut on_delta))
            .await;

        assert_eq!(text, "streamed reply");
        assert_eq!(seen, vec!["streamed reply"]);
    }

    #[tokio::test]
    async fn test_adapter_stream_error_fails_closed() {
        let adapter = CompletionAdapter::new(Arc::new(BrokenStreamEngine));
        let mut seen = Vec::new();
        let mut on_delta = |piece: &str| seen.push(piece.to_string());

        let text = adapter
            .generate("prompt", &GenerationParams::default(), Some(&mut on_delta))
            .await;

        assert_eq!(text, GENERATION_APOLOGY);
        assert_eq!(seen, vec!["partial "]);
    }

    #[test]
    fn test_adapter_debug_names_engine() {
        let adapter = CompletionAdapter::new(Arc::new(FixedEngine("x")));
        assert_eq!(adapter.engine_name(), "fixed");
        assert!(format!("{:?}", adapter).contains("fixed"));
    }
}
