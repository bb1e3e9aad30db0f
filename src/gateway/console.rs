// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Terminal gateway
//!
//! Prints bridge output to stdout. A terminal cannot edit earlier lines
//! reliably, so this gateway is send-only and turns get segmented streaming.

use async_trait::async_trait;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use crossterm::ExecutableCommand;
use std::io::{self, Write};

use super::{ChannelTarget, MessagingGateway};
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ConsoleGateway {
    color: Color,
}

impl Default for ConsoleGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self { color: Color::Cyan }
    }

    pub fn with_color(color: Color) -> Self {
        Self { color }
    }
}

/// Prefix every line of `content` with the channel tag.
pub fn render_lines(target: &ChannelTarget, content: &str) -> Vec<String> {
    let tag = format!("[{}#{}]", target.platform, target.channel_id);
    if content.is_empty() {
        return vec![tag];
    }
    content
        .lines()
        .map(|line| {
            if line.is_empty() {
                tag.clone()
            } else {
                format!("{tag} {line}")
            }
        })
        .collect()
}

#[async_trait]
impl MessagingGateway for ConsoleGateway {
    fn name(&self) -> &str {
        "console"
    }

    async fn send_message(&self, target: &ChannelTarget, content: &str) -> Result<Vec<String>> {
        let mut stdout = io::stdout();
        stdout.execute(SetForegroundColor(self.color))?;
        for line in render_lines(target, content) {
            writeln!(stdout, "{line}")?;
        }
        stdout.execute(ResetColor)?;
        stdout.flush()?;
        Ok(vec![uuid::Uuid::new_v4().to_string()])
    }
}
