// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Typed events and message parts from the agent service's event feed
//!
//! Raw feed entries are `{type, properties}` JSON objects. They are validated
//! once, here, into closed enums; anything unrecognised becomes an `Other`
//! variant so the dispatcher can log it without failing.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use super::types::{MessageInfo, SessionInfo};

/// One entry of the agent service's event feed
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    SessionCreated { session: SessionInfo },
    SessionDeleted { session: SessionInfo },
    SessionUpdated { session: SessionInfo },
    /// Session lifecycle change (`idle`, `busy`, `retry`, ...)
    SessionStatus { session_id: String, status: String },
    /// Agent-side failure for the session's current turn
    SessionError {
        session_id: Option<String>,
        message: String,
    },
    SessionIdle { session_id: String },
    SessionDiff { session_id: Option<String> },
    MessageUpdated { info: MessageInfo },
    PartUpdated { part: Part },
    Other { kind: String, properties: Value },
}

impl Event {
    /// Validate a raw `{type, properties}` object. Returns `None` when the
    /// object has no `type` at all.
    pub fn from_value(value: Value) -> Option<Event> {
        let kind = value.get("type")?.as_str()?.to_string();
        let properties = value.get("properties").cloned().unwrap_or(Value::Null);

        let event = match kind.as_str() {
            "session.created" | "session.deleted" | "session.updated" => {
                match session_info(&properties) {
                    Some(session) => match kind.as_str() {
                        "session.created" => Event::SessionCreated { session },
                        "session.deleted" => Event::SessionDeleted { session },
                        _ => Event::SessionUpdated { session },
                    },
                    None => Event::Other { kind, properties },
                }
            }
            "session.status" => {
                let session_id = session_id_of(&properties);
                let status = properties
                    .get("status")
                    .and_then(|s| s.get("type").or(Some(s)))
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
                    .to_string();
                match session_id {
                    Some(session_id) => Event::SessionStatus { session_id, status },
                    None => Event::Other { kind, properties },
                }
            }
            "session.error" => Event::SessionError {
                session_id: session_id_of(&properties),
                message: error_message(properties.get("error")),
            },
            "session.idle" => match session_id_of(&properties) {
                Some(session_id) => Event::SessionIdle { session_id },
                None => Event::Other { kind, properties },
            },
            "session.diff" => Event::SessionDiff {
                session_id: session_id_of(&properties),
            },
            "message.updated" => {
                let info = properties
                    .get("info")
                    .cloned()
                    .and_then(|info| serde_json::from_value::<MessageInfo>(info).ok());
                match info {
                    Some(mut info) => {
                        if info.session_id.is_none() {
                            info.session_id = str_field(&properties, "sessionID");
                        }
                        Event::MessageUpdated { info }
                    }
                    None => Event::Other { kind, properties },
                }
            }
            "message.part.updated" => match properties.get("part").cloned() {
                Some(raw) if raw.is_object() => {
                    let mut part = Part::from_value(raw);
                    if part.session_id.is_none() {
                        part.session_id = str_field(&properties, "sessionID");
                    }
                    Event::PartUpdated { part }
                }
                _ => Event::Other { kind, properties },
            },
            _ => Event::Other { kind, properties },
        };
        Some(event)
    }

    /// Event type name as it appears on the wire.
    pub fn kind(&self) -> &str {
        match self {
            Event::SessionCreated { .. } => "session.created",
            Event::SessionDeleted { .. } => "session.deleted",
            Event::SessionUpdated { .. } => "session.updated",
            Event::SessionStatus { .. } => "session.status",
            Event::SessionError { .. } => "session.error",
            Event::SessionIdle { .. } => "session.idle",
            Event::SessionDiff { .. } => "session.diff",
            Event::MessageUpdated { .. } => "message.updated",
            Event::PartUpdated { .. } => "message.part.updated",
            Event::Other { kind, .. } => kind,
        }
    }

    /// Agent session this event belongs to, when the payload names one.
    pub fn session_id(&self) -> Option<&str> {
        match self {
            Event::SessionCreated { session }
            | Event::SessionDeleted { session }
            | Event::SessionUpdated { session } => Some(&session.id),
            Event::SessionStatus { session_id, .. } | Event::SessionIdle { session_id } => {
                Some(session_id)
            }
            Event::SessionError { session_id, .. } | Event::SessionDiff { session_id } => {
                session_id.as_deref()
            }
            Event::MessageUpdated { info } => info.session_id.as_deref(),
            Event::PartUpdated { part } => part.session_id.as_deref(),
            Event::Other { properties, .. } => properties
                .get("sessionID")
                .and_then(Value::as_str),
        }
    }

    /// Agent message this event belongs to, when the payload names one.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            Event::MessageUpdated { info } => Some(&info.id),
            Event::PartUpdated { part } => part.message_id.as_deref(),
            _ => None,
        }
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn session_id_of(properties: &Value) -> Option<String> {
    str_field(properties, "sessionID").or_else(|| {
        properties
            .get("info")
            .and_then(|info| str_field(info, "id"))
    })
}

fn session_info(properties: &Value) -> Option<SessionInfo> {
    properties
        .get("info")
        .cloned()
        .and_then(|info| serde_json::from_value(info).ok())
}

/// Best human-readable message from an agent error payload.
fn error_message(error: Option<&Value>) -> String {
    let Some(error) = error else {
        return "unknown error".to_string();
    };
    error
        .get("data")
        .and_then(|data| data.get("message"))
        .or_else(|| error.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| error.to_string())
}

/// A typed fragment of agent output
#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub id: Option<String>,
    pub session_id: Option<String>,
    pub message_id: Option<String>,
    pub body: PartBody,
}

/// Part payload, one variant per part type
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum PartBody {
    Text {
        #[serde(default)]
        text: String,
    },
    Reasoning {
        #[serde(default)]
        text: String,
    },
    Tool {
        #[serde(default, rename = "callID")]
        call_id: Option<String>,
        #[serde(default)]
        tool: String,
        #[serde(default)]
        state: ToolState,
    },
    StepStart {},
    StepFinish {
        #[serde(default)]
        success: Option<bool>,
        #[serde(default)]
        title: Option<String>,
    },
    Agent {
        #[serde(default)]
        name: Option<String>,
    },
    Subtask {
        #[serde(default)]
        agent: Option<String>,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        prompt: Option<String>,
    },
    Patch {
        #[serde(default)]
        hash: Option<String>,
        #[serde(default)]
        files: Vec<String>,
    },
    Retry {
        #[serde(default)]
        attempt: Option<u32>,
        #[serde(default)]
        error: Option<Value>,
    },
    File {
        #[serde(default)]
        filename: Option<String>,
        #[serde(default)]
        url: Option<String>,
    },
    Snapshot {},
    Compaction {},
    /// Any part type this crate does not model
    #[serde(skip)]
    Other { kind: String },
}

impl PartBody {
    /// Part type name as it appears on the wire.
    pub fn kind(&self) -> &str {
        match self {
            PartBody::Text { .. } => "text",
            PartBody::Reasoning { .. } => "reasoning",
            PartBody::Tool { .. } => "tool",
            PartBody::StepStart {} => "step-start",
            PartBody::StepFinish { .. } => "step-finish",
            PartBody::Agent { .. } => "agent",
            PartBody::Subtask { .. } => "subtask",
            PartBody::Patch { .. } => "patch",
            PartBody::Retry { .. } => "retry",
            PartBody::File { .. } => "file",
            PartBody::Snapshot {} => "snapshot",
            PartBody::Compaction {} => "compaction",
            PartBody::Other { kind } => kind,
        }
    }
}

impl Part {
    /// Build a part from its raw JSON object. Never fails: a payload that does
    /// not match its declared type is kept as `PartBody::Other`.
    pub fn from_value(value: Value) -> Part {
        let id = str_field(&value, "id");
        let session_id = str_field(&value, "sessionID");
        let message_id = str_field(&value, "messageID");
        let kind = str_field(&value, "type").unwrap_or_else(|| "unknown".to_string());

        let body = match serde_json::from_value::<PartBody>(value) {
            Ok(body) => body,
            Err(err) => {
                if !matches!(
                    kind.as_str(),
                    "text" | "reasoning" | "tool" | "step-start" | "step-finish"
                ) {
                    tracing::trace!(kind = %kind, "unmodelled part type");
                } else {
                    tracing::debug!(kind = %kind, error = %err, "malformed part payload");
                }
                PartBody::Other { kind }
            }
        };

        Part {
            id,
            session_id,
            message_id,
            body,
        }
    }

    /// Convenience constructor used when the ids are known up front.
    pub fn new(body: PartBody) -> Part {
        Part {
            id: None,
            session_id: None,
            message_id: None,
            body,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn in_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn in_message(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn kind(&self) -> &str {
        self.body.kind()
    }
}

impl<'de> Deserialize<'de> for Part {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Part::from_value(value))
    }
}

/// Execution state of a tool part
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct ToolState {
    #[serde(default)]
    pub status: ToolStatus,
    #[serde(default)]
    pub input: Value,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default)]
    pub title: Option<String>,
}

impl ToolState {
    pub fn with_status(status: ToolStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }
}

/// Tool call lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Pending,
    Running,
    Completed,
    Error,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ToolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolStatus::Pending => "pending",
            ToolStatus::Running => "running",
            ToolStatus::Completed => "completed",
            ToolStatus::Error => "error",
            ToolStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ToolStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
