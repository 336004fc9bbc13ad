// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap
//!
//! Every flag is optional; when given it overrides the settings file and
//! environment.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::chat::prompt::PromptTemplate;
use crate::config::{Backend, Settings};

/// toolchat - local LLM chat with JSON tool calling
#[derive(Parser, Debug)]
#[command(name = "toolchat")]
#[command(version, about = "Local LLM chat with JSON tool calling")]
pub struct Cli {
    /// Path to the GGUF model file
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Cap on messages appended per user turn
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Print the reply as it is generated
    #[arg(long)]
    pub stream: bool,

    /// Send tool results as "Tool Result:" user segments
    #[arg(long)]
    pub no_native_tool_role: bool,

    /// Prompt template the model expects
    #[arg(long)]
    pub template: Option<TemplateArg>,

    /// Completion backend
    #[arg(long)]
    pub backend: Option<BackendArg>,

    /// Use an already running llama-server instead of launching one
    #[arg(long)]
    pub server_url: Option<String>,

    /// Config file path
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Run a single turn with this message and exit
    #[arg(short, long)]
    pub prompt: Option<String>,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TemplateArg {
    Llama3,
    Chatml,
}

impl From<TemplateArg> for PromptTemplate {
    fn from(arg: TemplateArg) -> Self {
        match arg {
            TemplateArg::Llama3 => PromptTemplate::Llama3,
            TemplateArg::Chatml => PromptTemplate::ChatML,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendArg {
    /// llama-server over HTTP
    Server,
    /// llama.cpp in-process (needs the `local-llm` feature)
    Embedded,
}

impl From<BackendArg> for Backend {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Server => Backend::Server,
            BackendArg::Embedded => Backend::Embedded,
        }
    }
}

impl Cli {
    /// Apply flags on top of already loaded settings
    pub fn apply_to(&self, settings: &mut Settings) {
        if let Some(model) = &self.model {
            settings.model.path = model.clone();
        }
        if let Some(max_iterations) = self.max_iterations {
            settings.agent.max_iterations = max_iterations;
        }
        if self.stream {
            settings.agent.stream = true;
        }
        if self.no_native_tool_role {
            settings.model.native_tool_role = false;
        }
        if let Some(template) = self.template {
            settings.model.template = template.into();
        }
        if let Some(backend) = self.backend {
            settings.engine.backend = backend.into();
        }
        if let Some(url) = &self.server_url {
            settings.engine.server_url = Some(url.clone());
        }
    }
}
