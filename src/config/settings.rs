// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Settings management for chatbridge
//!
//! Handles loading and saving settings from ~/.chatbridge/settings.json

use serde::{Deserialize, Serialize};
use std::time::Duration;

mod io;
mod validation;

pub use validation::ModelRef;

/// Main settings structure, stored in ~/.chatbridge/settings.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Agent service address
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Agent session used when no per-user binding exists yet
    #[serde(default)]
    pub default_session: Option<String>,

    /// Model override in `provider/model` form
    #[serde(default)]
    pub model: Option<String>,

    /// Inactivity budget for a turn, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Completion supervisor poll interval, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Show the agent's reasoning alongside its answer
    #[serde(default = "default_true")]
    pub show_reasoning: bool,

    /// Show tool call notifications
    #[serde(default = "default_true")]
    pub show_tool_messages: bool,

    /// Send a "processing" notice when a turn starts
    #[serde(default = "default_true")]
    pub show_processing_message: bool,

    /// Streaming output settings
    #[serde(default)]
    pub streaming: StreamingConfig,

    /// Workspace directory new agent sessions are created in
    #[serde(default)]
    pub directory: Option<String>,
}

/// Streaming output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamingConfig {
    /// Whether partial output is streamed at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delivery strategy selection
    #[serde(default)]
    pub mode: StreamModeSetting,

    /// Minimum spacing between in-place edits, in milliseconds
    #[serde(default = "default_stream_interval_ms")]
    pub interval_ms: u64,
}

/// Configured streaming strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StreamModeSetting {
    /// Native if the gateway can edit messages, segmented otherwise
    #[default]
    Auto,
    /// Always edit one message in place
    Native,
    /// Always send successive chunks
    Segment,
}

impl StreamModeSetting {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamModeSetting::Auto => "auto",
            StreamModeSetting::Native => "native",
            StreamModeSetting::Segment => "segment",
        }
    }
}

impl std::str::FromStr for StreamModeSetting {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(StreamModeSetting::Auto),
            "native" => Ok(StreamModeSetting::Native),
            "segment" | "segmented" => Ok(StreamModeSetting::Segment),
            other => Err(format!("unknown stream mode '{}'", other)),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            default_session: None,
            model: None,
            timeout_ms: default_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            show_reasoning: true,
            show_tool_messages: true,
            show_processing_message: true,
            streaming: StreamingConfig::default(),
            directory: None,
        }
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            mode: StreamModeSetting::Auto,
            interval_ms: default_stream_interval_ms(),
        }
    }
}

impl Settings {
    /// Per-turn inactivity budget.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Completion supervisor tick.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Minimum spacing between native edits.
    pub fn stream_interval(&self) -> Duration {
        Duration::from_millis(self.streaming.interval_ms)
    }

    /// Workspace directory, or `"default"` when none is configured.
    pub fn workspace(&self) -> &str {
        self.directory.as_deref().unwrap_or("default")
    }
}

fn default_base_url() -> String {
    "http://localhost:4096".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_stream_interval_ms() -> u64 {
    500
}

fn default_true() -> bool {
    true
}
