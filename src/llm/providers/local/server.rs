// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! llama-server subprocess manager
//!
//! Owns the lifecycle of a llama-server process serving the configured GGUF
//! model on a loopback port. The process is killed when the manager drops.

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::Mutex;

use crate::error::{Result, ToolchatError};

pub const DEFAULT_PORT: u16 = 8847;
const HEALTH_POLL_INTERVAL_MS: u64 = 500;
const HEALTH_TIMEOUT_SECS: u64 = 120;

/// How to launch llama-server
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub binary_path: PathBuf,
    pub model_path: PathBuf,
    pub port: u16,
    pub gpu_layers: Option<u32>,
    pub ctx_size: Option<u32>,
    pub threads: Option<u32>,
}

impl LaunchOptions {
    /// Launch `llama-server` from PATH with the given model on the default port
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            binary_path: PathBuf::from("llama-server"),
            model_path: model_path.into(),
            port: DEFAULT_PORT,
            gpu_layers: None,
            ctx_size: None,
            threads: None,
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);

        cmd.arg("--model")
            .arg(&self.model_path)
            .arg("--port")
            .arg(self.port.to_string())
            .arg("--host")
            .arg("127.0.0.1");

        if let Some(ngl) = self.gpu_layers {
            cmd.arg("--n-gpu-layers").arg(ngl.to_string());
        }
        if let Some(ctx) = self.ctx_size {
            cmd.arg("--ctx-size").arg(ctx.to_string());
        }
        if let Some(threads) = self.threads {
            cmd.arg("--threads").arg(threads.to_string());
        }

        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        cmd
    }
}

/// Manages a llama-server subprocess
pub struct LlamaServer {
    process: Mutex<Option<Child>>,
    options: LaunchOptions,
}

impl LlamaServer {
    pub fn new(options: LaunchOptions) -> Self {
        Self {
            process: Mutex::new(None),
            options,
        }
    }

    /// Start the subprocess and wait until `/health` answers
    pub async fn start(&self) -> Result<()> {
        if self.is_running() {
            return Ok(());
        }

        let child = self.options.command().spawn().map_err(|e| {
            ToolchatError::Config(format!(
                "Failed to start llama-server at {}: {}",
                self.options.binary_path.display(),
                e
            ))
        })?;

        match self.process.lock() {
            Ok(mut guard) => *guard = Some(child),
            Err(_) => {
                return Err(ToolchatError::Engine(
                    "llama-server process lock poisoned".to_string(),
                ))
            }
        }

        self.wait_for_ready().await?;

        tracing::info!(
            target: "toolchat.llm.server",
            port = self.options.port,
            model = %self.options.model_path.display(),
            "llama-server started"
        );

        Ok(())
    }

    async fn wait_for_ready(&self) -> Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/health", self.base_url());
        let max_attempts = (HEALTH_TIMEOUT_SECS * 1000 / HEALTH_POLL_INTERVAL_MS) as usize;

        for attempt in 0..max_attempts {
            if !self.is_running() {
                return Err(ToolchatError::Config(
                    "llama-server process exited unexpectedly during startup".to_string(),
                ));
            }

            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }

            tracing::trace!(target: "toolchat.llm.server", attempt, "waiting for llama-server");
            tokio::time::sleep(tokio::time::Duration::from_millis(HEALTH_POLL_INTERVAL_MS)).await;
        }

        self.shutdown();
        Err(ToolchatError::Config(format!(
            "llama-server failed to start within {} seconds. \
             The model may be too large for your system's memory.",
            HEALTH_TIMEOUT_SECS
        )))
    }

    /// Base URL of the managed server
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.options.port)
    }

    /// Check if the server process is still running
    pub fn is_running(&self) -> bool {
        if let Ok(mut guard) = self.process.lock() {
            if let Some(ref mut child) = *guard {
                return matches!(child.try_wait(), Ok(None));
            }
        }
        false
    }

    /// Kill the subprocess if one is running
    pub fn shutdown(&self) {
        if let Ok(mut guard) = self.process.lock() {
            if let Some(mut child) = guard.take() {
                let _ = child.kill();
                let _ = child.wait();
                tracing::debug!(target: "toolchat.llm.server", "llama-server stopped");
            }
        }
    }
}

impl Drop for LlamaServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_options_defaults() {
        let options = LaunchOptions::new("/models/test.gguf");
        assert_eq!(options.port, DEFAULT_PORT);
        assert_eq!(options.binary_path, PathBuf::from("llama-server"));
        assert!(options.gpu_layers.is_none());
    }

    #[test]
    fn test_command_arguments() {
        let options = LaunchOptions {
            gpu_layers: Some(28),
            ctx_size: Some(8192),
            threads: Some(12),
            ..LaunchOptions::new("/models/test.gguf")
        };
        let cmd = options.command();
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().to_string())
            .collect();

        assert_eq!(args[0], "--model");
        assert_eq!(args[1], "/models/test.gguf");
        assert!(args.windows(2).any(|w| w == ["--n-gpu-layers", "28"]));
        assert!(args.windows(2).any(|w| w == ["--ctx-size", "8192"]));
        assert!(args.windows(2).any(|w| w == ["--threads", "12"]));
        assert!(args.windows(2).any(|w| w == ["--host", "127.0.0.1"]));
    }

    #[test]
    fn test_llama_server_custom_port() {
        let server = LlamaServer::new(LaunchOptions {
            port: 9999,
            ..LaunchOptions::new("/models/test.gguf")
        });
        assert_eq!(server.base_url(), "http://127.0.0.1:9999");
    }

    #[test]
    fn test_llama_server_not_running_initially() {
        let server = LlamaServer::new(LaunchOptions::new("/nonexistent"));
        assert!(!server.is_running());
    }

    #[tokio::test]
    async fn test_start_with_missing_binary_is_config_error() {
        let server = LlamaServer::new(LaunchOptions {
            binary_path: PathBuf::from("/nonexistent/llama-server-binary"),
            ..LaunchOptions::new("/nonexistent.gguf")
        });
        let err = server.start().await.unwrap_err();
        assert!(matches!(err, ToolchatError::Config(_)));
        assert!(err.to_string().contains("Failed to start llama-server"));
    }
}
