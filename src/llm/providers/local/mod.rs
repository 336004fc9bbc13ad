// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Completion engine backed by llama-server
//!
//! Talks to llama-server's native `/completion` endpoint with a raw prompt,
//! so the prompt encoding stays entirely on our side. The server is either
//! an existing instance at a configured URL or a subprocess we launch and own.

pub mod server;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Result, ToolchatError};
use crate::llm::provider::{CompletionEngine, GenerationParams, TextStream};

pub use server::{LaunchOptions, LlamaServer, DEFAULT_PORT};

enum Endpoint {
    Remote(String),
    Managed {
        options: LaunchOptions,
        server: Arc<Mutex<Option<LlamaServer>>>,
    },
}

/// Completion engine using a llama-server instance
pub struct LocalEngine {
    client: Client,
    endpoint: Endpoint,
}

impl LocalEngine {
    /// Use an already running llama-server at `base_url`
    pub fn connect(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: Client::new(),
            endpoint: Endpoint::Remote(base_url),
        }
    }

    /// Launch and own a llama-server subprocess on first use.
    ///
    /// Fails if the model file does not exist.
    pub fn managed(options: LaunchOptions) -> Result<Self> {
        if !options.model_path.exists() {
            return Err(ToolchatError::Config(format!(
                "Model file not found: {}",
                options.model_path.display()
            )));
        }

        Ok(Self {
            client: Client::new(),
            endpoint: Endpoint::Managed {
                options,
                server: Arc::new(Mutex::new(None)),
            },
        })
    }

    /// Make sure the server is reachable, starting it if we own it
    pub async fn warm_up(&self) -> Result<()> {
        self.ensure_server().await.map(|_| ())
    }

    async fn ensure_server(&self) -> Result<String> {
        match &self.endpoint {
            Endpoint::Remote(url) => Ok(url.clone()),
            Endpoint::Managed { options, server } => {
                let mut guard = server.lock().await;

                if let Some(ref running) = *guard {
                    if running.is_running() {
                        return Ok(running.base_url());
                    }
                    tracing::warn!(target: "toolchat.llm.server", "llama-server exited; restarting");
                }

                let started = LlamaServer::new(options.clone());
                started.start().await?;
                let url = started.base_url();
                *guard = Some(started);

                Ok(url)
            }
        }
    }

    fn build_request<'a>(
        prompt: &'a str,
        params: &'a GenerationParams,
        stream: bool,
    ) -> CompletionBody<'a> {
        CompletionBody {
            prompt,
            n_predict: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
            repeat_penalty: params.repeat_penalty,
            stop: &params.stop,
            stream,
            cache_prompt: true,
        }
    }

    async fn post(&self, body: &CompletionBody<'_>) -> Result<reqwest::Response> {
        let base_url = self.ensure_server().await?;
        let url = format!("{}/completion", base_url);

        tracing::debug!(
            target: "toolchat.llm.server",
            url = %url,
            prompt_chars = body.prompt.len(),
            stream = body.stream,
            "posting completion request"
        );

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                ToolchatError::Engine(format!("Failed to connect to llama-server: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ToolchatError::Engine(format!(
                "llama-server returned {}: {}",
                status, body
            )));
        }

        Ok(response)
    }
}

#[async_trait]
impl CompletionEngine for LocalEngine {
    fn name(&self) -> &str {
        "llama-server"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let body = Self::build_request(prompt, params, false);
        let response = self.post(&body).await?;

        let completion: CompletionChunk = response.json().await.map_err(|e| {
            ToolchatError::Engine(format!("Failed to parse llama-server response: {}", e))
        })?;

        Ok(completion.content)
    }

    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TextStream> {
        let body = Self::build_request(prompt, params, true);
        let response = self.post(&body).await?;

        // (pending bytes, saw final chunk)
        type StreamState = (Vec<u8>, bool);

        let fragments = response
            .bytes_stream()
            .scan(
                (Vec::new(), false),
                |state: &mut StreamState, chunk| {
                    let (buffer, done) = state;
                    if *done {
                        return futures::future::ready(None);
                    }

                    let bytes = match chunk {
                        Ok(bytes) => bytes,
                        Err(e) => {
                            *done = true;
                            return futures::future::ready(Some(vec![Err(ToolchatError::Engine(
                                format!("llama-server stream interrupted: {}", e),
                            ))]));
                        }
                    };
                    buffer.extend_from_slice(&bytes);

                    let mut pieces = Vec::new();
                    while let Some(line_end) = buffer.iter().position(|b| *b == b'\n') {
                        let line: Vec<u8> = buffer.drain(..=line_end).collect();
                        let line = String::from_utf8_lossy(&line);

                        match parse_sse_line(&line) {
                            Some(Ok(chunk)) => {
                                if !chunk.content.is_empty() {
                                    pieces.push(Ok(chunk.content));
                                }
                                if chunk.stop {
                                    *done = true;
                                    break;
                                }
                            }
                            Some(Err(e)) => pieces.push(Err(e)),
                            None => {}
                        }
                    }

                    futures::future::ready(Some(pieces))
                },
            )
            .flat_map(futures::stream::iter);

        Ok(Box::pin(fragments))
    }
}

/// Parse one server-sent-events line from `/completion?stream=true`.
///
/// Blank lines and comments yield `None`.
pub(crate) fn parse_sse_line(line: &str) -> Option<Result<CompletionChunk>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let data = line.strip_prefix("data:")?.trim_start();
    Some(serde_json::from_str::<CompletionChunk>(data).map_err(ToolchatError::from))
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    prompt: &'a str,
    n_predict: u32,
    temperature: f32,
    top_p: f32,
    repeat_penalty: f32,
    stop: &'a [String],
    stream: bool,
    cache_prompt: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CompletionChunk {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub stop: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_engine_name() {
        let engine = LocalEngine::connect("http://127.0.0.1:8080");
        assert_eq!(engine.name(), "llama-server");
    }

    #[test]
    fn test_connect_trims_trailing_slash() {
        let engine = LocalEngine::connect("http://127.0.0.1:8080/");
        match engine.endpoint {
            Endpoint::Remote(url) => assert_eq!(url, "http://127.0.0.1:8080"),
            Endpoint::Managed { .. } => panic!("expected remote endpoint"),
        }
    }

    #[test]
    fn test_managed_requires_model_file() {
        let result = LocalEngine::managed(LaunchOptions::new("/nonexistent/model.gguf"));
        let err = result.err().unwrap();
        assert!(matches!(err, ToolchatError::Config(_)));
        assert!(err.to_string().contains("Model file not found"));
    }

    #[test]
    fn test_managed_with_existing_model() {
        let model = tempfile::NamedTempFile::new().unwrap();
        let engine = LocalEngine::managed(LaunchOptions::new(model.path())).unwrap();
        assert!(matches!(engine.endpoint, Endpoint::Managed { .. }));
    }

    #[test]
    fn test_build_request_body() {
        let params = GenerationParams::default();
        let body = LocalEngine::build_request("hello", &params, false);
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["prompt"], "hello");
        assert_eq!(json["n_predict"], 1024);
        assert_eq!(json["stream"], false);
        assert_eq!(json["cache_prompt"], true);
        assert_eq!(json["stop"][0], "<|eot_id|>");
    }

    #[test]
    fn test_parse_sse_line_content() {
        let chunk = parse_sse_line(r#"data: {"content":"Hel","stop":false}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.content, "Hel");
        assert!(!chunk.stop);
    }

    #[test]
    fn test_parse_sse_line_final() {
        let chunk = parse_sse_line(r#"data: {"content":"","stop":true,"tokens_predicted":3}"#)
            .unwrap()
            .unwrap();
        assert!(chunk.content.is_empty());
        assert!(chunk.stop);
    }

    #[test]
    fn test_parse_sse_line_skips_blank_and_comments() {
        assert!(parse_sse_line("").is_none());
        assert!(parse_sse_line("   ").is_none());
        assert!(parse_sse_line(": keep-alive").is_none());
        assert!(parse_sse_line("event: message").is_none());
    }

    #[test]
    fn test_parse_sse_line_bad_json() {
        assert!(parse_sse_line("data: {not json").unwrap().is_err());
    }
}
