// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Bridge core
//!
//! Relays chat messages to the agent service and streams the agent's output
//! back to the originating channel. The engine owns one consumer of the
//! global event feed; each turn registers a session record that the consumer
//! routes events into, and a supervisor that ends the turn.

use std::time::Duration;

use crate::config::{ModelRef, Settings};
use crate::error::Result;

pub mod assembler;
pub mod delivery;
pub mod dispatcher;
pub mod engine;
pub mod format;
pub mod identity;
pub mod registry;
pub mod resolver;
pub mod state;
pub mod supervisor;
pub mod turn;

pub use delivery::StreamSettings;
pub use dispatcher::Dispatcher;
pub use engine::Engine;
pub use identity::{Origin, SessionKey};
pub use registry::{SessionRegistry, Tracked};
pub use resolver::SessionResolver;
pub use state::{SessionState, SessionStatus, StreamMode};
pub use supervisor::{Supervisor, TurnOutcome};

/// Runtime options derived from [`Settings`]
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Workspace fingerprinted into every session key
    pub workspace: String,
    /// Directory new agent sessions are rooted in
    pub directory: Option<String>,
    pub model: Option<ModelRef>,
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub show_reasoning: bool,
    pub show_tool_messages: bool,
    pub show_processing_message: bool,
    pub streaming: StreamSettings,
}

impl BridgeOptions {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Ok(Self {
            workspace: settings.workspace().to_string(),
            directory: settings.directory.clone(),
            model: settings.model_ref()?,
            timeout: settings.timeout(),
            poll_interval: settings.poll_interval(),
            show_reasoning: settings.show_reasoning,
            show_tool_messages: settings.show_tool_messages,
            show_processing_message: settings.show_processing_message,
            streaming: StreamSettings::from_settings(settings),
        })
    }
}

impl Default for BridgeOptions {
    fn default() -> Self {
        let settings = Settings::default();
        Self {
            workspace: settings.workspace().to_string(),
            directory: None,
            model: None,
            timeout: settings.timeout(),
            poll_interval: settings.poll_interval(),
            show_reasoning: settings.show_reasoning,
            show_tool_messages: settings.show_tool_messages,
            show_processing_message: settings.show_processing_message,
            streaming: StreamSettings::from_settings(&settings),
        }
    }
}
