// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! chatbridge - relay chat messages to a streaming agent service
//!
//! Entry point for the chatbridge CLI. The terminal acts as the chat platform.

use std::sync::Arc;

use clap::Parser;
use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};

use chatbridge::agent::{AgentService, OpencodeClient};
use chatbridge::cli::{Cli, Commands};
use chatbridge::config::Settings;
use chatbridge::error::Result;
use chatbridge::gateway::{ConsoleGateway, MessagingGateway};

#[path = "main/cli_commands.rs"]
mod cli_commands;

use cli_commands::{run_chat, run_model_command, run_models, run_repl, run_session_command, Context};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut env_filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::WARN.into());

    // `-v` turns on bridge diagnostics; `RUST_LOG` still takes precedence.
    if cli.verbose > 0 {
        let directive = if cli.verbose > 1 {
            "chatbridge=trace"
        } else {
            "chatbridge=debug"
        };
        if let Ok(parsed) = directive.parse() {
            env_filter = env_filter.add_directive(parsed);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli).await {
        let mut stderr = std::io::stderr();
        let _ = stderr.execute(SetForegroundColor(Color::Red));
        eprintln!("❌ {err}");
        let _ = stderr.execute(ResetColor);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings_path = cli.config.clone().unwrap_or_else(Settings::default_path);
    let settings = Settings::load_from(&settings_path)?;
    settings.validate()?;

    let base_url = cli
        .base_url
        .clone()
        .unwrap_or_else(|| settings.effective_base_url());
    tracing::debug!(base_url = %base_url, settings = %settings_path.display(), "starting");

    let agent: Arc<dyn AgentService> = Arc::new(OpencodeClient::new(base_url));
    let gateway: Arc<dyn MessagingGateway> = Arc::new(ConsoleGateway::new());
    let mut ctx = Context::new(agent, gateway, settings, settings_path, &cli.user);

    match cli.command {
        Commands::Chat(args) => run_chat(&ctx, &args.text()).await,
        Commands::Repl => run_repl(&ctx).await,
        Commands::Models(args) => run_models(&ctx, args.keyword.as_deref()).await,
        Commands::Model(args) => run_model_command(&mut ctx, args).await,
        Commands::Session(args) => run_session_command(&mut ctx, args).await,
        Commands::Health => {
            let text = chatbridge::commands::system::health(ctx.agent.as_ref()).await?;
            println!("{text}");
            Ok(())
        }
        Commands::Agents => {
            let text = chatbridge::commands::system::agents(ctx.agent.as_ref()).await?;
            println!("{text}");
            Ok(())
        }
        Commands::StreamStatus => {
            let streaming = chatbridge::bridge::StreamSettings::from_settings(&ctx.settings);
            println!(
                "{}",
                chatbridge::commands::system::stream_status(&streaming, ctx.gateway.as_ref())
            );
            Ok(())
        }
    }
}
