// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Agent service abstraction
//!
//! The agent service owns sessions and answers prompts asynchronously: output
//! arrives on a separate, continuous event feed rather than in the prompt
//! response. Everything the bridge needs from it sits behind [`AgentService`].

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::Result;

pub mod client;
pub mod event;
pub mod mock;
mod sse;
pub mod types;

pub use client::OpencodeClient;
pub use event::{Event, Part, PartBody, ToolState, ToolStatus};
pub use mock::MockAgentService;
pub use types::{
    AgentInfo, HealthInfo, MessageInfo, MessageWithParts, ModelInfo, PromptModel, PromptRequest,
    PromptResponse, ProviderInfo, SessionInfo,
};

/// Boxed stream of validated feed events
pub type EventStream = Pin<Box<dyn Stream<Item = Result<Event>> + Send>>;

/// Operations the bridge consumes from the agent service
#[async_trait]
pub trait AgentService: Send + Sync {
    /// Create a session, optionally rooted in a workspace directory
    async fn create_session(&self, title: &str, directory: Option<&str>) -> Result<SessionInfo>;

    /// List all sessions
    async fn list_sessions(&self) -> Result<Vec<SessionInfo>>;

    /// Fetch one session; `Ok(None)` when it no longer exists
    async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>>;

    /// Delete a session
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Send a prompt; returns once the service accepted (and, for replying
    /// prompts, usually finished) the turn
    async fn prompt(&self, session_id: &str, request: PromptRequest) -> Result<PromptResponse>;

    /// Ordered transcript of a session
    async fn messages(&self, session_id: &str) -> Result<Vec<MessageWithParts>>;

    /// Providers and their models
    async fn providers(&self) -> Result<Vec<ProviderInfo>>;

    /// Configured agents
    async fn agents(&self) -> Result<Vec<AgentInfo>>;

    /// Service health
    async fn health(&self) -> Result<HealthInfo>;

    /// Subscribe to the global event feed
    async fn subscribe(&self) -> Result<EventStream>;
}
