// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! toolchat - local LLM chat with JSON tool calling
//!
//! Entry point for the toolchat CLI.

use clap::Parser;

use toolchat::chat::display::clean_response;
use toolchat::chat::engine::{ChatEngine, NoopAgentLoopObserver};
use toolchat::chat::input_parser::{classify, InputKind};
use toolchat::cli::Cli;
use toolchat::config::{load_dotenv, Settings};
use toolchat::error::Result;
use toolchat::llm::factory::EngineFactory;
use toolchat::llm::message::Conversation;
use toolchat::tools::ToolRegistry;

#[path = "main/chat_ui.rs"]
mod chat_ui;

use chat_ui::{
    print_error, print_notice, print_response_prefix, print_welcome, read_user_input, CliObserver,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let dotenv = load_dotenv(None)?;
    init_tracing(cli.verbose);
    if let Some(path) = &dotenv {
        tracing::debug!(target: "toolchat.config", path = %path.display(), "loaded .env");
    }

    let mut settings = Settings::resolve(cli.config.as_deref())?;
    cli.apply_to(&mut settings);
    settings.validate()?;

    tracing::info!(
        target: "toolchat",
        backend = ?settings.engine.backend,
        model = %settings.model.path.display(),
        template = %settings.model.template,
        "starting"
    );

    let engine = EngineFactory::create(&settings, true).await?;
    let chat = EngineFactory::chat_engine(engine, ToolRegistry::with_builtins(), &settings);

    match &cli.prompt {
        Some(prompt) => run_single(&chat, prompt).await,
        None => run_repl(&chat, settings.agent.stream).await,
    }
}

/// `-v` turns on loop and engine diagnostics, `-vv` everything in the crate.
/// `RUST_LOG` directives still apply.
fn init_tracing(verbose: u8) {
    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    let directives: &[&str] = match verbose {
        0 => &[],
        1 => &["toolchat.chat.engine=debug", "toolchat.llm=debug"],
        _ => &["toolchat=trace"],
    };
    for directive in directives {
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run_single(chat: &ChatEngine, prompt: &str) -> Result<()> {
    let mut conversation = Conversation::new();
    let summary = chat
        .run_turn(&mut conversation, prompt, &mut NoopAgentLoopObserver)
        .await?;
    println!("{}", clean_response(&summary.final_text));
    Ok(())
}

async fn run_repl(chat: &ChatEngine, stream: bool) -> Result<()> {
    print_welcome(chat.engine_name(), &chat.registry().names())?;

    let mut conversation = Conversation::new();
    let mut observer = CliObserver::new(stream);

    loop {
        let Some(line) = read_user_input()? else {
            println!();
            break;
        };

        match classify(&line) {
            InputKind::Empty => continue,
            InputKind::Exit => break,
            InputKind::Clear => {
                conversation.clear();
                print_notice("Conversation cleared.")?;
            }
            InputKind::Message(text) => {
                match chat.run_turn(&mut conversation, &text, &mut observer).await {
                    Ok(summary) => {
                        print_response_prefix()?;
                        println!("{}", clean_response(&summary.final_text));
                    }
                    Err(e) => {
                        tracing::error!(target: "toolchat", error = %e, "turn failed");
                        print_error(&e.to_string())?;
                    }
                }
            }
        }
    }

    print_notice("Goodbye!")?;
    Ok(())
}
