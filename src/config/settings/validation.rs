// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::chat::agent::MIN_MAX_ITERATIONS;
use crate::error::{Result, ToolchatError};

use super::Settings;

impl Settings {
    /// Reject values the loop or the engines cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_iterations < MIN_MAX_ITERATIONS {
            return Err(ToolchatError::Config(format!(
                "max_iterations must be at least {}, got {}",
                MIN_MAX_ITERATIONS, self.agent.max_iterations
            )));
        }

        let generation = &self.generation;
        if generation.max_tokens == 0 {
            return Err(ToolchatError::Config(
                "max_tokens must be positive".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&generation.temperature) {
            return Err(ToolchatError::Config(format!(
                "temperature must be within [0, 2], got {}",
                generation.temperature
            )));
        }
        if !(generation.top_p > 0.0 && generation.top_p <= 1.0) {
            return Err(ToolchatError::Config(format!(
                "top_p must be within (0, 1], got {}",
                generation.top_p
            )));
        }
        if generation.repeat_penalty <= 0.0 || generation.repeat_penalty.is_nan() {
            return Err(ToolchatError::Config(format!(
                "repeat_penalty must be positive, got {}",
                generation.repeat_penalty
            )));
        }

        Ok(())
    }
}
