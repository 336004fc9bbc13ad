// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::path::{Path, PathBuf};

use crate::error::{Result, ToolchatError};

use super::Settings;

/// Parse a boolean the way environment flags are usually written
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

/// Load a dotenv file into the process environment.
///
/// Reads `path`, or `.env` found from the working directory upwards when
/// `None`. Variables already set in the process keep their values. A
/// missing file is not an error; a malformed one is.
pub fn load_dotenv(path: Option<&Path>) -> Result<Option<PathBuf>> {
    let loaded = match path {
        Some(path) => dotenvy::from_path(path).map(|()| path.to_path_buf()),
        None => dotenvy::dotenv(),
    };

    match loaded {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(ToolchatError::Config(format!("failed to read .env: {}", e))),
    }
}

impl Settings {
    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides using `lookup` to read variables.
    ///
    /// Recognised: `MODEL_PATH`, `MAX_ITERATIONS`, `ENABLE_STREAMING`,
    /// `NATIVE_TOOL_ROLE`, `LLAMA_SERVER_URL`. Empty values are ignored.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(path) = get("MODEL_PATH") {
            self.model.path = PathBuf::from(path);
        }

        if let Some(raw) = get("MAX_ITERATIONS") {
            self.agent.max_iterations = raw.trim().parse().map_err(|_| {
                ToolchatError::Config(format!("MAX_ITERATIONS must be an integer, got '{}'", raw))
            })?;
        }

        if let Some(raw) = get("ENABLE_STREAMING") {
            self.agent.stream = env_bool("ENABLE_STREAMING", &raw)?;
        }

        if let Some(raw) = get("NATIVE_TOOL_ROLE") {
            self.model.native_tool_role = env_bool("NATIVE_TOOL_ROLE", &raw)?;
        }

        if let Some(url) = get("LLAMA_SERVER_URL") {
            self.engine.server_url = Some(url.trim().to_string());
        }

        Ok(())
    }
}

fn env_bool(key: &str, raw: &str) -> Result<bool> {
    parse_bool(raw).ok_or_else(|| {
        ToolchatError::Config(format!("{} must be true/false/1/0/yes/no, got '{}'", key, raw))
    })
}
