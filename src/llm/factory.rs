// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Engine factory
//!
//! Builds the configured completion engine and the matching chat engine
//! from [`Settings`], so every entry point wires things the same way.

use std::sync::Arc;

use crate::chat::engine::ChatEngine;
use crate::chat::prompt::PromptEncoder;
use crate::config::{Backend, Settings};
use crate::error::Result;
use crate::llm::provider::CompletionEngine;
use crate::llm::providers::{LaunchOptions, LocalEngine};
use crate::tools::ToolRegistry;

/// Factory for creating completion engines
pub struct EngineFactory;

impl EngineFactory {
    /// Create the engine selected by `settings.engine.backend`.
    ///
    /// With `warm_up`, a managed llama-server is started (and a remote one
    /// probed) before returning, so startup failures surface here.
    pub async fn create(settings: &Settings, warm_up: bool) -> Result<Arc<dyn CompletionEngine>> {
        match settings.engine.backend {
            Backend::Server => Self::create_server(settings, warm_up).await,
            Backend::Embedded => Self::create_embedded(settings),
        }
    }

    /// Create a llama-server engine, connecting or launching as configured
    pub async fn create_server(
        settings: &Settings,
        warm_up: bool,
    ) -> Result<Arc<dyn CompletionEngine>> {
        let engine = match &settings.engine.server_url {
            Some(url) => LocalEngine::connect(url.clone()),
            None => LocalEngine::managed(Self::launch_options(settings))?,
        };

        if warm_up {
            engine.warm_up().await?;
        }

        Ok(Arc::new(engine))
    }

    #[cfg(feature = "local-llm")]
    pub fn create_embedded(settings: &Settings) -> Result<Arc<dyn CompletionEngine>> {
        use crate::llm::providers::{EmbeddedConfig, EmbeddedEngine};

        let config = EmbeddedConfig::new(&settings.model.path)
            .with_context_size(settings.engine.context_size)
            .with_gpu_layers(settings.engine.gpu_layers)
            .with_threads(settings.engine.threads);
        Ok(Arc::new(EmbeddedEngine::new(config)?))
    }

    #[cfg(not(feature = "local-llm"))]
    pub fn create_embedded(_settings: &Settings) -> Result<Arc<dyn CompletionEngine>> {
        Err(crate::error::ToolchatError::Config(
            "The embedded backend needs a build with the `local-llm` feature".to_string(),
        ))
    }

    /// llama-server launch options from settings
    pub fn launch_options(settings: &Settings) -> LaunchOptions {
        let mut options = LaunchOptions::new(&settings.model.path);
        options.binary_path = settings.engine.server_binary.clone();
        options.port = settings.engine.port;
        options.gpu_layers = Some(settings.engine.gpu_layers);
        options.ctx_size = Some(settings.engine.context_size);
        options.threads = Some(settings.engine.threads);
        options
    }

    /// Wire a chat engine around `engine` using the loop settings
    pub fn chat_engine(
        engine: Arc<dyn CompletionEngine>,
        registry: ToolRegistry,
        settings: &Settings,
    ) -> ChatEngine {
        ChatEngine::new(engine, registry)
            .with_encoder(PromptEncoder::new(
                settings.model.template,
                settings.model.native_tool_role,
            ))
            .with_params(settings.generation_params())
            .with_max_iterations(settings.agent.max_iterations)
            .with_streaming(settings.agent.stream)
    }
}
