// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use crossterm::{
    style::{Color, ResetColor, SetForegroundColor},
    ExecutableCommand,
};
use tokio::io::{AsyncBufReadExt, BufReader};

use chatbridge::agent::AgentService;
use chatbridge::bridge::{BridgeOptions, Engine, Origin, SessionKey, SessionResolver};
use chatbridge::cli::{ModelArgs, ModelCommands, SessionArgs, SessionCommands};
use chatbridge::commands::{models, session};
use chatbridge::config::Settings;
use chatbridge::error::Result;
use chatbridge::gateway::{ChannelTarget, MessagingGateway};

const CONSOLE_PLATFORM: &str = "console";
const CONSOLE_CHANNEL: &str = "terminal";

/// Everything a CLI command needs
pub(super) struct Context {
    pub(super) agent: Arc<dyn AgentService>,
    pub(super) gateway: Arc<dyn MessagingGateway>,
    pub(super) settings: Settings,
    settings_path: PathBuf,
    origin: Origin,
}

impl Context {
    pub(super) fn new(
        agent: Arc<dyn AgentService>,
        gateway: Arc<dyn MessagingGateway>,
        settings: Settings,
        settings_path: PathBuf,
        user: &str,
    ) -> Self {
        let origin = Origin::new(user, user, ChannelTarget::new(CONSOLE_PLATFORM, CONSOLE_CHANNEL));
        Self {
            agent,
            gateway,
            settings,
            settings_path,
            origin,
        }
    }

    fn key(&self) -> SessionKey {
        self.origin.key(self.settings.workspace())
    }

    fn resolver(&self) -> SessionResolver {
        let resolver = SessionResolver::new(Arc::clone(&self.agent), self.settings.directory.clone());
        self.bind_default(&resolver);
        resolver
    }

    fn engine(&self) -> Result<Engine> {
        let options = BridgeOptions::from_settings(&self.settings)?;
        let engine = Engine::new(
            Arc::clone(&self.agent),
            Arc::clone(&self.gateway),
            options,
        );
        self.bind_default(engine.resolver());
        Ok(engine)
    }

    /// The saved default session belongs to the console identity only.
    fn bind_default(&self, resolver: &SessionResolver) {
        if let Some(id) = &self.settings.default_session {
            resolver.bind(&self.key(), id.clone());
        }
    }

    fn save_settings(&self) -> Result<()> {
        self.settings.save_to(&self.settings_path)
    }
}

/// Send one message and wait for the turn to end.
pub(super) async fn run_chat(ctx: &Context, message: &str) -> Result<()> {
    let engine = ctx.engine()?;
    engine.start().await?;

    let result = tokio::select! {
        result = engine.run_turn(&ctx.origin, message) => result.map(|_| ()),
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
            Ok(())
        }
    };

    engine.shutdown().await;
    result
}

/// Read lines from stdin and run each as a turn until EOF or `/quit`.
pub(super) async fn run_repl(ctx: &Context) -> Result<()> {
    let engine = ctx.engine()?;
    engine.start().await?;
    print_banner(ctx)?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print_prompt()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            break;
        };

        let message = line.trim();
        if message == "/quit" || message == "/exit" {
            break;
        }
        if message.is_empty() {
            continue;
        }

        let turn = tokio::select! {
            result = engine.run_turn(&ctx.origin, message) => Some(result),
            _ = tokio::signal::ctrl_c() => None,
        };
        match turn {
            // The engine already told the user; keep the loop alive.
            Some(Err(err)) => tracing::debug!(error = %err, "turn failed"),
            Some(Ok(_)) => {}
            None => break,
        }
    }

    engine.shutdown().await;
    Ok(())
}

pub(super) async fn run_models(ctx: &Context, keyword: Option<&str>) -> Result<()> {
    let text = models::list(ctx.agent.as_ref(), keyword).await?;
    println!("{text}");
    Ok(())
}

pub(super) async fn run_model_command(ctx: &mut Context, args: ModelArgs) -> Result<()> {
    match args.command {
        ModelCommands::Set { model } => {
            let agent = Arc::clone(&ctx.agent);
            let text = models::set(agent.as_ref(), &mut ctx.settings, &model).await?;
            ctx.save_settings()?;
            println!("{text}");
        }
    }
    Ok(())
}

pub(super) async fn run_session_command(ctx: &mut Context, args: SessionArgs) -> Result<()> {
    let resolver = ctx.resolver();
    let key = ctx.key();
    let agent = Arc::clone(&ctx.agent);

    let text = match args.command {
        SessionCommands::List => session::list(agent.as_ref()).await?,
        SessionCommands::New => {
            let directory = ctx.settings.workspace().to_string();
            let text = session::create(&resolver, &key, &directory).await?;
            persist_binding(ctx, &resolver, &key)?;
            text
        }
        SessionCommands::Set { id } => {
            let text = session::switch(agent.as_ref(), &resolver, &key, &id).await?;
            persist_binding(ctx, &resolver, &key)?;
            text
        }
        SessionCommands::Info => session::info(&resolver, &key).await?,
        SessionCommands::Delete { id } => {
            let text = session::delete(agent.as_ref(), &resolver, &id).await?;
            if ctx.settings.default_session.as_deref() == Some(id.as_str()) {
                ctx.settings.default_session = None;
                ctx.save_settings()?;
            }
            text
        }
        SessionCommands::Messages { page } => {
            session::messages(agent.as_ref(), &resolver, &key, page).await?
        }
    };

    println!("{text}");
    Ok(())
}

/// The CLI exits after each command, so a switch only sticks if it is saved
/// as the default session.
fn persist_binding(ctx: &mut Context, resolver: &SessionResolver, key: &SessionKey) -> Result<()> {
    ctx.settings.default_session = resolver.bound(key);
    ctx.save_settings()
}

fn print_banner(ctx: &Context) -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Cyan))?;
    println!("chatbridge v{}", env!("CARGO_PKG_VERSION"));
    stdout.execute(ResetColor)?;
    println!("Talking as: {}", ctx.origin.user_id);
    println!("Type /quit to exit.");
    Ok(())
}

fn print_prompt() -> Result<()> {
    let mut stdout = io::stdout();
    stdout.execute(SetForegroundColor(Color::Green))?;
    print!("you: ");
    stdout.execute(ResetColor)?;
    stdout.flush()?;
    Ok(())
}
