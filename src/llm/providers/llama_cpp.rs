// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! In-process completion engine using llama.cpp
//!
//! Loads a GGUF model once through llama-cpp-2 and runs every generation on a
//! blocking thread. Only compiled with the `local-llm` feature.
//!
//! # Usage
//!
//! ```no_run
//! use toolchat::llm::providers::{EmbeddedConfig, EmbeddedEngine};
//!
//! # fn main() -> toolchat::Result<()> {
//! let engine = EmbeddedEngine::new(EmbeddedConfig::new("/path/to/model.gguf"))?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use crate::error::{Result, ToolchatError};
use crate::llm::provider::{CompletionEngine, GenerationParams, TextStream};

/// Default context size (tokens)
const DEFAULT_CONTEXT_SIZE: u32 = 8192;

/// Default number of layers offloaded to the GPU
const DEFAULT_GPU_LAYERS: u32 = 28;

/// Tokens considered by the repetition penalty
const PENALTY_LAST_N: i32 = 64;

/// Configuration for the embedded engine
#[derive(Debug, Clone)]
pub struct EmbeddedConfig {
    /// Path to the GGUF model file
    pub model_path: PathBuf,
    /// Context size (number of tokens)
    pub context_size: u32,
    /// Number of layers to offload to GPU (0 for CPU-only)
    pub gpu_layers: u32,
    /// Number of threads to use for inference
    pub threads: Option<u32>,
    /// Seed for the final sampling step
    pub seed: u32,
}

impl EmbeddedConfig {
    /// Create a new config with the specified model path
    pub fn new(model_path: impl AsRef<Path>) -> Self {
        Self {
            model_path: model_path.as_ref().to_path_buf(),
            context_size: DEFAULT_CONTEXT_SIZE,
            gpu_layers: DEFAULT_GPU_LAYERS,
            threads: None,
            seed: 0,
        }
    }

    /// Set the context size
    pub fn with_context_size(mut self, size: u32) -> Self {
        self.context_size = size;
        self
    }

    /// Set the number of GPU layers
    pub fn with_gpu_layers(mut self, layers: u32) -> Self {
        self.gpu_layers = layers;
        self
    }

    /// Set the number of threads
    pub fn with_threads(mut self, threads: u32) -> Self {
        self.threads = Some(threads);
        self
    }
}

/// Completion engine running llama.cpp in-process
pub struct EmbeddedEngine {
    config: EmbeddedConfig,
    backend: Arc<LlamaBackend>,
    model: Arc<LlamaModel>,
}

impl EmbeddedEngine {
    /// Load the model. Fails if the file is missing or unreadable.
    pub fn new(config: EmbeddedConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(ToolchatError::Config(format!(
                "Model file not found: {}",
                config.model_path.display()
            )));
        }

        let backend = LlamaBackend::init().map_err(|e| {
            ToolchatError::Engine(format!("Failed to initialize llama.cpp backend: {}", e))
        })?;

        let model_params = LlamaModelParams::default().with_n_gpu_layers(config.gpu_layers);
        let model = LlamaModel::load_from_file(&backend, &config.model_path, &model_params)
            .map_err(|e| ToolchatError::Config(format!("Failed to load model: {}", e)))?;

        tracing::info!(
            target: "toolchat.llm.embedded",
            model = %config.model_path.display(),
            gpu_layers = config.gpu_layers,
            context_size = config.context_size,
            "model loaded"
        );

        Ok(Self {
            config,
            backend: Arc::new(backend),
            model: Arc::new(model),
        })
    }
}

#[async_trait]
impl CompletionEngine for EmbeddedEngine {
    fn name(&self) -> &str {
        "llama.cpp"
    }

    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let backend = Arc::clone(&self.backend);
        let model = Arc::clone(&self.model);
        let config = self.config.clone();
        let prompt = prompt.to_string();
        let params = params.clone();

        tokio::task::spawn_blocking(move || {
            run_generation(&backend, &model, &config, &prompt, &params, |_| true)
        })
        .await
        .map_err(|e| ToolchatError::Engine(format!("Inference task failed: {}", e)))?
    }

    async fn generate_stream(&self, prompt: &str, params: &GenerationParams) -> Result<TextStream> {
        let backend = Arc::clone(&self.backend);
        let model = Arc::clone(&self.model);
        let config = self.config.clone();
        let prompt = prompt.to_string();
        let params = params.clone();
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<Result<String>>();

        tokio::task::spawn_blocking(move || {
            let result = run_generation(&backend, &model, &config, &prompt, &params, |piece| {
                tx.send(Ok(piece.to_string())).is_ok()
            });
            if let Err(e) = result {
                let _ = tx.send(Err(e));
            }
        });

        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

fn engine_error(what: &str, e: impl std::fmt::Display) -> ToolchatError {
    ToolchatError::Engine(format!("{}: {}", what, e))
}

fn build_sampler(params: &GenerationParams, seed: u32) -> LlamaSampler {
    let mut samplers = Vec::new();

    if params.repeat_penalty != 1.0 {
        samplers.push(LlamaSampler::penalties(
            PENALTY_LAST_N,
            params.repeat_penalty,
            0.0,
            0.0,
        ));
    }

    if params.temperature <= 0.0 {
        samplers.push(LlamaSampler::greedy());
    } else {
        samplers.push(LlamaSampler::top_p(params.top_p, 1));
        samplers.push(LlamaSampler::temp(params.temperature));
        samplers.push(LlamaSampler::dist(seed));
    }

    LlamaSampler::chain_simple(samplers)
}

/// Prefill the prompt and sample until end-of-generation, a stop sequence,
/// the token budget, or `on_piece` returning false.
fn run_generation(
    backend: &LlamaBackend,
    model: &LlamaModel,
    config: &EmbeddedConfig,
    prompt: &str,
    params: &GenerationParams,
    mut on_piece: impl FnMut(&str) -> bool,
) -> Result<String> {
    let mut ctx_params =
        LlamaContextParams::default().with_n_ctx(NonZeroU32::new(config.context_size));
    if let Some(threads) = config.threads {
        ctx_params = ctx_params
            .with_n_threads(threads as i32)
            .with_n_threads_batch(threads as i32);
    }

    let mut ctx = model
        .new_context(backend, ctx_params)
        .map_err(|e| engine_error("Failed to create context", e))?;

    let tokens = model
        .str_to_token(prompt, AddBos::Always)
        .map_err(|e| engine_error("Failed to tokenize prompt", e))?;

    let n_ctx = ctx.n_ctx() as usize;
    if tokens.len() >= n_ctx {
        return Err(ToolchatError::Engine(format!(
            "Prompt ({} tokens) exceeds the context window ({} tokens)",
            tokens.len(),
            n_ctx
        )));
    }

    let n_batch = ctx.n_batch() as usize;
    for chunk in tokens.chunks(n_batch.max(1)) {
        let mut batch =
            LlamaBatch::get_one(chunk).map_err(|e| engine_error("Failed to create batch", e))?;
        ctx.decode(&mut batch)
            .map_err(|e| engine_error("Prefill decode failed", e))?;
    }

    let mut sampler = build_sampler(params, config.seed);
    let mut decoder = encoding_rs::UTF_8.new_decoder();
    let mut scanner = StopScanner::new(&params.stop);
    let budget = (params.max_tokens as usize).min(n_ctx - tokens.len());
    let mut generated = 0usize;

    for _ in 0..budget {
        let token = sampler.sample(&ctx, -1);
        sampler.accept(token);

        if model.is_eog_token(token) {
            break;
        }
        generated += 1;

        let piece = model
            .token_to_piece(token, &mut decoder, true, None)
            .map_err(|e| engine_error("Failed to decode token", e))?;

        let (ready, stopped) = scanner.push(&piece);
        if !ready.is_empty() && !on_piece(&ready) {
            break;
        }
        if stopped {
            break;
        }

        let next = [token];
        let mut batch =
            LlamaBatch::get_one(&next).map_err(|e| engine_error("Failed to create batch", e))?;
        ctx.decode(&mut batch)
            .map_err(|e| engine_error("Decode failed", e))?;
    }

    let (rest, text) = scanner.finish();
    if !rest.is_empty() {
        on_piece(&rest);
    }

    tracing::debug!(
        target: "toolchat.llm.embedded",
        prompt_tokens = tokens.len(),
        generated,
        "generation finished"
    );

    Ok(text)
}

/// Cuts generated text at the first stop sequence.
///
/// Text that could still turn into a stop sequence is held back until the
/// next piece decides it, so streamed output never shows a partial marker.
struct StopScanner {
    stops: Vec<String>,
    text: String,
    emitted: usize,
}

impl StopScanner {
    fn new(stops: &[String]) -> Self {
        Self {
            stops: stops.iter().filter(|s| !s.is_empty()).cloned().collect(),
            text: String::new(),
            emitted: 0,
        }
    }

    /// Append a piece; returns text safe to emit and whether a stop was hit
    fn push(&mut self, piece: &str) -> (String, bool) {
        self.text.push_str(piece);

        let hit = self
            .stops
            .iter()
            .filter_map(|stop| self.text.find(stop.as_str()))
            .min();

        if let Some(pos) = hit {
            self.text.truncate(pos);
            let ready = self.text.get(self.emitted..).unwrap_or("").to_string();
            self.emitted = self.text.len();
            return (ready, true);
        }

        let safe_end = self.text.len() - self.pending_prefix_len();
        let ready = self.text[self.emitted..safe_end].to_string();
        self.emitted = safe_end;
        (ready, false)
    }

    fn pending_prefix_len(&self) -> usize {
        let mut longest = 0;
        for stop in &self.stops {
            for (idx, _) in stop.char_indices().skip(1) {
                if idx > longest && self.text.ends_with(&stop[..idx]) {
                    longest = idx;
                }
            }
        }
        longest.min(self.text.len() - self.emitted)
    }

    /// Remaining unemitted text and the full output
    fn finish(self) -> (String, String) {
        let rest = self.text[self.emitted..].to_string();
        (rest, self.text)
    }
}
