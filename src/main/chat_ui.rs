// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use toolchat::chat::display::{format_tool_invocation, format_tool_result, format_welcome};
use toolchat::chat::engine::{AgentLoopObserver, TurnSummary};
use toolchat::error::Result;
use toolchat::tools::CallResult;

/// Print the startup banner
pub(super) fn print_welcome(engine_name: &str, tool_names: &[&str]) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("{}", format_welcome(engine_name, tool_names));
    stdout.execute(ResetColor)?;
    println!();
    Ok(())
}

/// Prompt for and read one line. `None` on end of input.
pub(super) fn read_user_input() -> Result<Option<String>> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("\nYou: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;

    let mut input = String::new();
    if io::stdin().read_line(&mut input)? == 0 {
        return Ok(None);
    }
    Ok(Some(input))
}

pub(super) fn print_response_prefix() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    print!("\nAssistant: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}

pub(super) fn print_notice(text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::DarkGrey))?;
    println!("{}", text);
    stdout.execute(ResetColor)?;
    Ok(())
}

pub(super) fn print_error(text: &str) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Red))?;
    println!("Error: {}", text);
    stdout.execute(ResetColor)?;
    Ok(())
}

/// Renders loop progress to the terminal
pub(super) struct CliObserver {
    stream: bool,
    streamed_any: bool,
}

impl CliObserver {
    pub(super) fn new(stream: bool) -> Self {
        Self {
            stream,
            streamed_any: false,
        }
    }

    fn end_stream_line(&mut self) {
        if self.streamed_any {
            println!();
            self.streamed_any = false;
        }
    }
}

impl AgentLoopObserver for CliObserver {
    fn on_text_delta(&mut self, text: &str) -> Result<()> {
        if !self.stream {
            return Ok(());
        }
        if !self.streamed_any {
            let mut stdout = io::stdout();
            stdout.execute(SetForegroundColor(Color::DarkGrey))?;
            print!("  ");
            stdout.execute(ResetColor)?;
        }
        self.streamed_any = true;
        print!("{}", text);
        io::stdout().flush()?;
        Ok(())
    }

    fn on_generation_complete(&mut self, _text: &str) -> Result<()> {
        self.end_stream_line();
        Ok(())
    }

    fn on_tool_invocation(
        &mut self,
        tool_name: Option<&str>,
        arguments: &serde_json::Value,
    ) -> Result<()> {
        let mut stdout = io::stdout();
        stdout.execute(SetForegroundColor(Color::DarkGrey))?;
        print!("  ╭─ ");
        stdout.execute(SetForegroundColor(Color::Magenta))?;
        println!("{}", format_tool_invocation(tool_name, arguments));
        stdout.execute(ResetColor)?;
        Ok(())
    }

    fn on_tool_result(&mut self, result: &CallResult) -> Result<()> {
        let mut stdout = io::stdout();
        stdout.execute(SetForegroundColor(Color::DarkGrey))?;
        print!("  ╰─ ");
        let colour = if result.is_error() {
            Color::Red
        } else {
            Color::Green
        };
        stdout.execute(SetForegroundColor(colour))?;
        println!("{}", format_tool_result(result));
        stdout.execute(ResetColor)?;
        Ok(())
    }

    fn on_iteration_cap(&mut self, max_iterations: usize) -> Result<()> {
        self.end_stream_line();
        let mut stdout = io::stdout();
        stdout.execute(SetForegroundColor(Color::Yellow))?;
        println!("  (stopped after {} messages this turn)", max_iterations);
        stdout.execute(ResetColor)?;
        Ok(())
    }

    fn on_agent_complete(&mut self, _summary: &TurnSummary) -> Result<()> {
        self.end_stream_line();
        Ok(())
    }
}
