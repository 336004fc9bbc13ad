// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Input parsing for the REPL
//!
//! Pure functions that classify one line of user input. No side effects, so
//! the REPL's command handling can be tested without a terminal.

/// What a line of user input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    /// Blank line; re-prompt
    Empty,
    /// Leave the REPL
    Exit,
    /// Reset the conversation
    Clear,
    /// Anything else is a user turn
    Message(String),
}

/// Check if user input is an exit command.
pub fn is_exit_command(input: &str) -> bool {
    let trimmed = input.trim().to_lowercase();
    matches!(trimmed.as_str(), "quit" | "exit" | "q")
}

/// Check if user input is a clear command.
pub fn is_clear_command(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("clear")
}

/// Classify a line read from the terminal
pub fn classify(input: &str) -> InputKind {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        InputKind::Empty
    } else if is_exit_command(trimmed) {
        InputKind::Exit
    } else if is_clear_command(trimmed) {
        InputKind::Clear
    } else {
        InputKind::Message(trimmed.to_string())
    }
}
