// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Messaging gateway abstraction
//!
//! The chat surface the bridge talks back to. Every platform can send;
//! some can also edit a message in place, which enables native streaming.

use async_trait::async_trait;

use crate::error::{GatewayError, Result};

pub mod console;
pub mod mock;

pub use console::ConsoleGateway;
pub use mock::MockGateway;

/// Where outbound messages go
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChannelTarget {
    pub platform: String,
    /// Bot identity on the platform
    pub self_id: Option<String>,
    pub channel_id: String,
    pub guild_id: Option<String>,
}

impl ChannelTarget {
    pub fn new(platform: impl Into<String>, channel_id: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
            self_id: None,
            channel_id: channel_id.into(),
            guild_id: None,
        }
    }

    pub fn with_guild(mut self, guild_id: impl Into<String>) -> Self {
        self.guild_id = Some(guild_id.into());
        self
    }

    pub fn with_self_id(mut self, self_id: impl Into<String>) -> Self {
        self.self_id = Some(self_id.into());
        self
    }
}

/// Outbound side of a chat platform
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Platform name used in logs and errors
    fn name(&self) -> &str;

    /// Whether `edit_message` works on this platform
    fn supports_edit(&self) -> bool {
        false
    }

    /// Send a message; returns the platform handles of what was posted
    async fn send_message(&self, target: &ChannelTarget, content: &str) -> Result<Vec<String>>;

    /// Replace the content of a previously sent message
    async fn edit_message(&self, _target: &ChannelTarget, _handle: &str, _content: &str) -> Result<()> {
        Err(GatewayError::EditUnsupported(self.name().to_string()).into())
    }
}
