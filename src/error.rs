// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Error types for toolchat
//!
//! Errors travel with `?` inside a component. They are turned into plain
//! values only at the two recovery boundaries: the completion adapter
//! (engine failures become an apology reply) and the call dispatcher
//! (tool failures become error results for the model to read).

use thiserror::Error;

/// Main error type for toolchat operations
#[derive(Error, Debug)]
pub enum ToolchatError {
    /// Configuration errors (bad settings, missing model file)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Completion engine errors
    #[error("Engine error: {0}")]
    Engine(String),

    /// Tool execution errors
    #[error("Tool execution failed: {0}")]
    ToolExecution(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for toolchat operations
pub type Result<T> = std::result::Result<T, ToolchatError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_config() {
        let err = ToolchatError::Config("bad config".to_string());
        assert!(err.to_string().contains("Configuration error"));
        assert!(err.to_string().contains("bad config"));
    }

    #[test]
    fn test_error_engine() {
        let err = ToolchatError::Engine("decode failed".to_string());
        assert_eq!(err.to_string(), "Engine error: decode failed");
    }

    #[test]
    fn test_error_tool_execution() {
        let err = ToolchatError::ToolExecution("tool failed".to_string());
        assert!(err.to_string().contains("tool failed"));
    }

    #[test]
    fn test_error_invalid_input() {
        let err = ToolchatError::InvalidInput("bad input".to_string());
        assert!(err.to_string().contains("Invalid input"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: ToolchatError = io_err.into();
        assert!(err.to_string().contains("IO error"));
    }

    #[test]
    fn test_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: ToolchatError = json_err.into();
        assert!(err.to_string().starts_with("JSON error"));
    }

    #[test]
    fn test_error_debug() {
        let err = ToolchatError::ToolExecution("test".to_string());
        let debug_str = format!("{:?}", err);
        assert!(debug_str.contains("ToolExecution"));
    }

    #[test]
    fn test_result_error() {
        fn test_fn() -> Result<i32> {
            Err(ToolchatError::InvalidInput("test".to_string()))
        }

        assert!(test_fn().is_err());
    }
}
