// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! CLI argument definitions using Clap

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// chatbridge - relay chat messages to a streaming agent service
#[derive(Parser, Debug)]
#[command(name = "chatbridge")]
#[command(version, about = "Relay chat messages to a streaming agent service")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Settings file path
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Agent service address (overrides settings)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// User id the console identity talks as
    #[arg(long, global = true, default_value = "operator")]
    pub user: String,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Send one message and stream the reply
    Chat(ChatArgs),

    /// Read messages from stdin until EOF or `/quit`
    Repl,

    /// List available models
    #[command(alias = "m")]
    Models(ModelsArgs),

    /// Model selection
    Model(ModelArgs),

    /// Session management
    #[command(alias = "s")]
    Session(SessionArgs),

    /// Check agent service health
    Health,

    /// List configured agents
    Agents,

    /// Show streaming configuration
    StreamStatus,
}

#[derive(clap::Args, Debug)]
pub struct ChatArgs {
    /// Message to send
    #[arg(required = true, num_args = 1..)]
    pub message: Vec<String>,
}

impl ChatArgs {
    pub fn text(&self) -> String {
        self.message.join(" ")
    }
}

#[derive(clap::Args, Debug)]
pub struct ModelsArgs {
    /// Keyword to filter providers and models by
    pub keyword: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ModelArgs {
    #[command(subcommand)]
    pub command: ModelCommands,
}

#[derive(Subcommand, Debug)]
pub enum ModelCommands {
    /// Set the default model (provider/model)
    Set { model: String },
}

#[derive(clap::Args, Debug)]
pub struct SessionArgs {
    #[command(subcommand)]
    pub command: SessionCommands,
}

#[derive(Subcommand, Debug)]
pub enum SessionCommands {
    /// List all agent sessions
    #[command(alias = "ls")]
    List,

    /// Create a new session and switch to it
    New,

    /// Switch to an existing session
    Set { id: String },

    /// Show the current session
    Info,

    /// Delete a session
    #[command(alias = "rm")]
    Delete { id: String },

    /// Page through your messages in the current session
    Messages { page: Option<usize> },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_cli_chat_joins_words() {
        let cli = Cli::parse_from(["chatbridge", "chat", "hello", "there"]);
        match cli.command {
            Commands::Chat(args) => assert_eq!(args.text(), "hello there"),
            other => panic!("unexpected command: {other:?}"),
        }
        assert_eq!(cli.user, "operator");
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn test_cli_chat_requires_message() {
        assert!(Cli::try_parse_from(["chatbridge", "chat"]).is_err());
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "chatbridge",
            "health",
            "-vv",
            "--config",
            "/tmp/s.json",
            "--base-url",
            "http://127.0.0.1:9000",
            "--user",
            "alice",
        ]);
        assert!(matches!(cli.command, Commands::Health));
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(cli.base_url.as_deref(), Some("http://127.0.0.1:9000"));
        assert_eq!(cli.user, "alice");
    }

    #[test]
    fn test_cli_session_messages_page() {
        let cli = Cli::parse_from(["chatbridge", "session", "messages", "2"]);
        match cli.command {
            Commands::Session(SessionArgs {
                command: SessionCommands::Messages { page },
            }) => assert_eq!(page, Some(2)),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_model_set() {
        let cli = Cli::parse_from(["chatbridge", "model", "set", "anthropic/claude-3-5-sonnet"]);
        match cli.command {
            Commands::Model(ModelArgs {
                command: ModelCommands::Set { model },
            }) => assert_eq!(model, "anthropic/claude-3-5-sonnet"),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_cli_aliases() {
        let cli = Cli::parse_from(["chatbridge", "s", "ls"]);
        assert!(matches!(
            cli.command,
            Commands::Session(SessionArgs {
                command: SessionCommands::List
            })
        ));
        let cli = Cli::parse_from(["chatbridge", "stream-status"]);
        assert!(matches!(cli.command, Commands::StreamStatus));
    }
}
