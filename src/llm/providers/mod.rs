// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Completion engine implementations

#[cfg(feature = "local-llm")]
pub mod llama_cpp;
pub mod local;

#[cfg(feature = "local-llm")]
pub use llama_cpp::{EmbeddedConfig, EmbeddedEngine};
pub use local::{LaunchOptions, LocalEngine};
