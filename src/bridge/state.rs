// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Per-conversation session state

use std::collections::{HashMap, HashSet};
use tokio::time::Instant;

use super::identity::SessionKey;
use crate::agent::ToolStatus;
use crate::gateway::ChannelTarget;

/// Lifecycle of the current turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Busy,
    Idle,
    Error,
}

impl SessionStatus {
    /// Map an agent status string. Anything not idle or error counts as busy.
    pub fn from_wire(status: &str) -> Self {
        match status {
            "idle" => SessionStatus::Idle,
            "error" => SessionStatus::Error,
            _ => SessionStatus::Busy,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Busy => "busy",
            SessionStatus::Idle => "idle",
            SessionStatus::Error => "error",
        }
    }
}

/// Resolved streaming strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamMode {
    Native,
    Segmented,
}

impl StreamMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamMode::Native => "native",
            StreamMode::Segmented => "segmented",
        }
    }
}

/// Latest snapshot of one agent message
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialMessage {
    pub text: String,
    pub reasoning: String,
}

/// Streaming cursor for the message currently being delivered
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// Cached once resolved; survives turn merges
    pub mode: Option<StreamMode>,
    pub message_id: Option<String>,
    /// Handle of the natively edited message
    pub handle: Option<String>,
    pub last_stream: Option<Instant>,
    /// Content of the current message already sent in segmented mode
    pub delivered: String,
    /// Content of the current message last shown by a native edit
    pub native_rendered: String,
    pub has_streamed: bool,
}

impl StreamState {
    /// Point the stream at `message_id`, restarting cursors if it changed.
    pub fn track(&mut self, message_id: &str) {
        if self.message_id.as_deref() == Some(message_id) {
            return;
        }
        self.message_id = Some(message_id.to_string());
        self.handle = None;
        self.last_stream = None;
        self.delivered.clear();
        self.native_rendered.clear();
    }

    /// Bytes of the current snapshot covered by segmented delivery.
    pub fn cursor(&self) -> usize {
        self.delivered.len()
    }

    /// Mark `content[..to]` as delivered; never moves backwards.
    pub fn advance(&mut self, content: &str, to: usize) {
        if to <= self.delivered.len() {
            return;
        }
        if let Some(prefix) = content.get(..to) {
            self.delivered = prefix.to_string();
        }
    }

    /// Where segmented delivery of `content` resumes.
    ///
    /// Snapshots normally extend what was delivered. When earlier content
    /// changed, such as reasoning arriving ahead of text that already went
    /// out, delivery resumes after the delivered text's new position, or at
    /// the longest unchanged prefix if it is gone. Always a char boundary.
    pub fn resume_point(&self, content: &str) -> usize {
        let delivered = self.delivered.as_str();
        if content.starts_with(delivered) {
            return delivered.len();
        }
        if let Some(idx) = content.find(delivered) {
            return idx + delivered.len();
        }
        content
            .char_indices()
            .zip(delivered.chars())
            .take_while(|((_, ours), theirs)| ours == theirs)
            .last()
            .map_or(0, |((idx, c), _)| idx + c.len_utf8())
    }

    /// Restart the delivered record at `content[..to]`.
    pub fn rebase(&mut self, content: &str, to: usize) {
        self.delivered = content.get(..to).unwrap_or_default().to_string();
    }

    /// Whether `content` is fully shown, by segments or by the native message.
    pub fn covers(&self, content: &str) -> bool {
        self.delivered == content || self.native_rendered == content
    }

    fn reset(&mut self) {
        self.message_id = None;
        self.handle = None;
        self.last_stream = None;
        self.delivered.clear();
        self.native_rendered.clear();
        self.has_streamed = false;
    }
}

/// Identity fields a new turn brings in
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub key: SessionKey,
    pub agent_session_id: String,
    pub target: ChannelTarget,
}

/// Everything the bridge tracks for one identity key
#[derive(Debug, Clone)]
pub struct SessionState {
    pub key: SessionKey,
    pub agent_session_id: String,
    pub target: ChannelTarget,
    pub partial_messages: HashMap<String, PartialMessage>,
    /// Last observed status per tool call id
    pub tool_states: HashMap<String, ToolStatus>,
    /// Grow-only
    pub sent_final_messages: HashSet<String>,
    /// Grow-only
    pub sent_tool_calls: HashSet<String>,
    pub stream: StreamState,
    pub message_roles: HashMap<String, String>,
    pub status: SessionStatus,
    pub last_activity: Instant,
    /// Message id returned by the prompt call of the current turn
    pub tracked_message_id: Option<String>,
}

impl SessionState {
    pub fn new(seed: SessionSeed) -> Self {
        Self {
            key: seed.key,
            agent_session_id: seed.agent_session_id,
            target: seed.target,
            partial_messages: HashMap::new(),
            tool_states: HashMap::new(),
            sent_final_messages: HashSet::new(),
            sent_tool_calls: HashSet::new(),
            stream: StreamState::default(),
            message_roles: HashMap::new(),
            status: SessionStatus::Busy,
            last_activity: Instant::now(),
            tracked_message_id: None,
        }
    }

    /// Start a new turn on an existing record. Dedup history, roles and the
    /// resolved stream mode are kept; streaming cursors restart.
    pub fn begin_turn(&mut self, seed: SessionSeed) {
        self.agent_session_id = seed.agent_session_id;
        self.target = seed.target;
        self.status = SessionStatus::Busy;
        self.tracked_message_id = None;
        self.stream.reset();
        self.touch();
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn is_user_message(&self, message_id: &str) -> bool {
        self.message_roles
            .get(message_id)
            .is_some_and(|role| role == "user")
    }

    pub fn partial(&mut self, message_id: &str) -> &mut PartialMessage {
        self.partial_messages
            .entry(message_id.to_string())
            .or_default()
    }
}
