// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Request and response types of the agent service

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::event::{Part, PartBody};
use crate::config::ModelRef;

/// An agent session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<SessionTime>,

    #[serde(
        default,
        rename = "createdAt",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at_raw: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionTime {
    /// Unix epoch milliseconds
    #[serde(default)]
    pub created: Option<i64>,
    #[serde(default)]
    pub updated: Option<i64>,
}

impl SessionInfo {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            model: None,
            time: None,
            created_at_raw: None,
        }
    }

    /// Creation time, from `time.created` or a `createdAt` millis/RFC 3339 value.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        if let Some(ms) = self.time.as_ref().and_then(|t| t.created) {
            return Utc.timestamp_millis_opt(ms).single();
        }
        match self.created_at_raw.as_ref()? {
            Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }
}

/// Metadata of one message in a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: String,

    #[serde(default)]
    pub role: String,

    #[serde(default, rename = "sessionID", skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

/// A message together with its parts, as returned by the message list call
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MessageWithParts {
    pub info: MessageInfo,
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl MessageWithParts {
    /// Text parts joined by newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match &part.body {
                PartBody::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Body of a prompt call
#[derive(Debug, Clone, Serialize)]
pub struct PromptRequest {
    #[serde(rename = "noReply", skip_serializing_if = "std::ops::Not::not")]
    pub no_reply: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<PromptModel>,

    pub parts: Vec<PromptPart>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptModel {
    #[serde(rename = "providerID")]
    pub provider_id: String,
    #[serde(rename = "modelID")]
    pub model_id: String,
}

impl From<ModelRef> for PromptModel {
    fn from(model: ModelRef) -> Self {
        Self {
            provider_id: model.provider_id,
            model_id: model.model_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptPart {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

impl PromptRequest {
    /// A prompt the agent should answer.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            no_reply: false,
            model: None,
            parts: vec![PromptPart {
                kind: "text".to_string(),
                text: text.into(),
            }],
        }
    }

    /// Context injected into the session without triggering a reply.
    pub fn silent(text: impl Into<String>) -> Self {
        Self {
            no_reply: true,
            ..Self::text(text)
        }
    }

    pub fn with_model(mut self, model: Option<PromptModel>) -> Self {
        self.model = model;
        self
    }
}

/// Response of a prompt call
#[derive(Debug, Clone, Deserialize)]
pub struct PromptResponse {
    #[serde(default)]
    pub info: Option<MessageInfo>,
}

/// A model provider and its models
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Either an array of models or an object keyed by model id
    #[serde(default)]
    models: Value,
}

/// A model offered by a provider
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModelInfo {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProviderInfo {
    pub fn new(id: impl Into<String>, name: Option<String>, models: Vec<ModelInfo>) -> Self {
        let models = models
            .into_iter()
            .map(|m| serde_json::json!({"id": m.id, "name": m.name}))
            .collect();
        Self {
            id: id.into(),
            name,
            models: Value::Array(models),
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Models regardless of whether the service sent them as a list or a map.
    pub fn models(&self) -> Vec<ModelInfo> {
        let entries: Vec<Value> = match &self.models {
            Value::Array(items) => items.clone(),
            Value::Object(map) => map.values().cloned().collect(),
            _ => Vec::new(),
        };
        entries
            .into_iter()
            .filter_map(|v| serde_json::from_value(v).ok())
            .collect()
    }
}

/// Response of the provider listing call
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProvidersResponse {
    #[serde(default)]
    pub providers: Vec<ProviderInfo>,
}

/// An agent configured on the service
#[derive(Debug, Clone, Deserialize)]
pub struct AgentInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl AgentInfo {
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .or(self.id.as_deref())
            .unwrap_or("unnamed")
    }
}

/// Service health report
#[derive(Debug, Clone, Deserialize)]
pub struct HealthInfo {
    #[serde(default)]
    pub healthy: bool,
    #[serde(default)]
    pub version: Option<String>,
}
