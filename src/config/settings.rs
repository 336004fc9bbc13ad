// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for toolchat
//!
//! Settings are layered: built-in defaults, then an optional JSON file
//! (`~/.toolchat/settings.json` or `$TOOLCHAT_HOME/settings.json`), then
//! environment variables (a `.env` file fills in any that are unset), then
//! command-line flags.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::chat::prompt::PromptTemplate;
use crate::llm::provider::{
    GenerationParams, DEFAULT_MAX_TOKENS, DEFAULT_REPEAT_PENALTY, DEFAULT_TEMPERATURE,
    DEFAULT_TOP_P,
};

mod env;
mod io;
mod validation;

pub use env::{load_dotenv, parse_bool};

/// Main settings structure, stored in ~/.toolchat/settings.json
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    /// Model file and prompt format
    #[serde(default)]
    pub model: ModelConfig,

    /// Completion backend
    #[serde(default)]
    pub engine: EngineConfig,

    /// Sampling parameters
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Conversation loop settings
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    /// Path to the GGUF model file
    #[serde(default = "default_model_path")]
    pub path: PathBuf,

    /// Segment marker scheme the model was trained on
    #[serde(default)]
    pub template: PromptTemplate,

    /// Send tool results in a `tool` segment rather than a prefixed user one
    #[serde(default = "default_true")]
    pub native_tool_role: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            template: PromptTemplate::default(),
            native_tool_role: true,
        }
    }
}

/// Which completion backend to run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// llama-server over HTTP
    #[default]
    Server,
    /// llama.cpp linked in-process (feature `local-llm`)
    Embedded,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub backend: Backend,

    /// Existing llama-server to use instead of launching one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_url: Option<String>,

    /// llama-server executable (looked up on PATH when relative)
    #[serde(default = "default_server_binary")]
    pub server_binary: PathBuf,

    /// Port for a managed llama-server (default: 8847)
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_context_size")]
    pub context_size: u32,

    /// Layers offloaded to the GPU
    #[serde(default = "default_gpu_layers")]
    pub gpu_layers: u32,

    #[serde(default = "default_threads")]
    pub threads: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            server_url: None,
            server_binary: default_server_binary(),
            port: default_port(),
            context_size: default_context_size(),
            gpu_layers: default_gpu_layers(),
            threads: default_threads(),
        }
    }
}

/// Sampling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    #[serde(default = "default_repeat_penalty")]
    pub repeat_penalty: f32,

    /// Overrides the template's stop sequences
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop: Option<Vec<String>>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            repeat_penalty: default_repeat_penalty(),
            stop: None,
        }
    }
}

/// Conversation loop configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    /// Cap on messages appended during one user turn
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Print generations as they arrive
    #[serde(default)]
    pub stream: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            stream: false,
        }
    }
}

impl Settings {
    /// Sampling parameters for the configured template
    pub fn generation_params(&self) -> GenerationParams {
        let stop = match &self.generation.stop {
            Some(stop) => stop.clone(),
            None => self
                .model
                .template
                .stop_sequences()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        GenerationParams::default()
            .with_max_tokens(self.generation.max_tokens)
            .with_temperature(self.generation.temperature)
            .with_top_p(self.generation.top_p)
            .with_repeat_penalty(self.generation.repeat_penalty)
            .with_stop(stop)
    }
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/llama-3.1-8b-instruct-q4_k_m.gguf")
}

fn default_true() -> bool {
    true
}

fn default_server_binary() -> PathBuf {
    PathBuf::from("llama-server")
}

fn default_port() -> u16 {
    crate::llm::providers::local::DEFAULT_PORT
}

fn default_context_size() -> u32 {
    8192
}

fn default_gpu_layers() -> u32 {
    28
}

fn default_threads() -> u32 {
    12
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_top_p() -> f32 {
    DEFAULT_TOP_P
}

fn default_repeat_penalty() -> f32 {
    DEFAULT_REPEAT_PENALTY
}

fn default_max_iterations() -> usize {
    crate::chat::agent::DEFAULT_MAX_ITERATIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_default() {
        let settings = Settings::default();
        assert_eq!(settings.model.template, PromptTemplate::Llama3);
        assert!(settings.model.native_tool_role);
        assert_eq!(settings.engine.backend, Backend::Server);
        assert_eq!(settings.engine.port, 8847);
        assert_eq!(settings.engine.context_size, 8192);
        assert_eq!(settings.engine.gpu_layers, 28);
        assert_eq!(settings.engine.threads, 12);
        assert_eq!(settings.agent.max_iterations, 20);
        assert!(!settings.agent.stream);
    }

    #[test]
    fn test_generation_config_default() {
        let config = GenerationConfig::default();
        assert_eq!(config.max_tokens, 1024);
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.top_p, 0.9);
        assert_eq!(config.repeat_penalty, 1.1);
        assert!(config.stop.is_none());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{"agent": {"stream": true}, "model": {"template": "chatml"}}"#)
                .unwrap();
        assert!(settings.agent.stream);
        assert_eq!(settings.agent.max_iterations, 20);
        assert_eq!(settings.model.template, PromptTemplate::ChatML);
        assert!(settings.model.native_tool_role);
    }

    #[test]
    fn test_backend_serialization() {
        assert_eq!(serde_json::to_string(&Backend::Embedded).unwrap(), "\"embedded\"");
        let backend: Backend = serde_json::from_str("\"server\"").unwrap();
        assert_eq!(backend, Backend::Server);
    }

    #[test]
    fn test_generation_params_follow_template() {
        let mut settings = Settings::default();
        settings.model.template = PromptTemplate::ChatML;
        let params = settings.generation_params();
        assert_eq!(params.stop, vec!["<|im_end|>", "<|endoftext|>"]);
        assert_eq!(params.max_tokens, 1024);
    }

    #[test]
    fn test_generation_params_stop_override() {
        let mut settings = Settings::default();
        settings.generation.stop = Some(vec!["END".to_string()]);
        settings.generation.temperature = 0.2;
        let params = settings.generation_params();
        assert_eq!(params.stop, vec!["END"]);
        assert_eq!(params.temperature, 0.2);
    }
}
