// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock agent service for testing
//!
//! Keeps sessions and transcripts in memory, records every prompt, and lets
//! tests push events onto the feed, either directly or scripted per prompt.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::event::Event;
use super::types::{
    AgentInfo, HealthInfo, MessageInfo, MessageWithParts, PromptRequest, PromptResponse,
    ProviderInfo, SessionInfo, SessionTime,
};
use super::{AgentService, EventStream};
use crate::error::{ApiError, BridgeError, Result};

/// Events to emit after a replying prompt: `(session_id, message_id) -> events`
pub type PromptScript = Arc<dyn Fn(&str, &str) -> Vec<Event> + Send + Sync>;

/// A prompt received by the mock
#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    pub session_id: String,
    pub request: PromptRequest,
}

/// In-memory agent service
#[derive(Clone, Default)]
pub struct MockAgentService {
    sessions: Arc<Mutex<Vec<SessionInfo>>>,
    transcripts: Arc<Mutex<HashMap<String, Vec<MessageWithParts>>>>,
    prompts: Arc<Mutex<Vec<RecordedPrompt>>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<Result<Event>>>>>,
    script: Arc<Mutex<Option<PromptScript>>>,
    prompt_failure: Arc<Mutex<Option<String>>>,
    providers: Arc<Mutex<Vec<ProviderInfo>>>,
    agents: Arc<Mutex<Vec<AgentInfo>>>,
    next_id: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock agent service lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl MockAgentService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing session.
    pub fn with_session(self, session: SessionInfo) -> Self {
        lock(&self.sessions).push(session);
        self
    }

    /// Seed the transcript returned by `messages` for a session.
    pub fn with_transcript(self, session_id: &str, messages: Vec<MessageWithParts>) -> Self {
        lock(&self.transcripts).insert(session_id.to_string(), messages);
        self
    }

    pub fn with_providers(self, providers: Vec<ProviderInfo>) -> Self {
        *lock(&self.providers) = providers;
        self
    }

    pub fn with_agents(self, agents: Vec<AgentInfo>) -> Self {
        *lock(&self.agents) = agents;
        self
    }

    /// Emit scripted events whenever a replying prompt arrives.
    pub fn on_prompt<F>(self, script: F) -> Self
    where
        F: Fn(&str, &str) -> Vec<Event> + Send + Sync + 'static,
    {
        *lock(&self.script) = Some(Arc::new(script));
        self
    }

    /// Make every replying prompt fail with a server error.
    pub fn fail_prompts(self, message: impl Into<String>) -> Self {
        *lock(&self.prompt_failure) = Some(message.into());
        self
    }

    /// Push an event to every current subscriber.
    pub fn emit(&self, event: Event) {
        lock(&self.subscribers).retain(|tx| tx.send(Ok(event.clone())).is_ok());
    }

    /// Push a transport error to every current subscriber.
    pub fn emit_error(&self, message: impl Into<String>) {
        let message = message.into();
        lock(&self.subscribers).retain(|tx| {
            tx.send(Err(BridgeError::Api(ApiError::StreamError(message.clone()))))
                .is_ok()
        });
    }

    /// Close the feed for all subscribers.
    pub fn close_feed(&self) {
        lock(&self.subscribers).clear();
    }

    pub fn subscriber_count(&self) -> usize {
        lock(&self.subscribers).len()
    }

    pub fn recorded_prompts(&self) -> Vec<RecordedPrompt> {
        lock(&self.prompts).clone()
    }

    pub fn session_ids(&self) -> Vec<String> {
        lock(&self.sessions).iter().map(|s| s.id.clone()).collect()
    }

    fn next(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

#[async_trait]
impl AgentService for MockAgentService {
    async fn create_session(&self, title: &str, _directory: Option<&str>) -> Result<SessionInfo> {
        let mut session = SessionInfo::new(self.next("ses"), title);
        session.time = Some(SessionTime {
            created: Some(chrono::Utc::now().timestamp_millis()),
            updated: None,
        });
        lock(&self.sessions).push(session.clone());
        Ok(session)
    }

    async fn list_sessions(&self) -> Result<Vec<SessionInfo>> {
        Ok(lock(&self.sessions).clone())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>> {
        Ok(lock(&self.sessions)
            .iter()
            .find(|s| s.id == session_id)
            .cloned())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        let mut sessions = lock(&self.sessions);
        let before = sessions.len();
        sessions.retain(|s| s.id != session_id);
        if sessions.len() == before {
            return Err(BridgeError::Api(ApiError::NotFound(format!(
                "session {session_id}"
            ))));
        }
        lock(&self.transcripts).remove(session_id);
        Ok(())
    }

    async fn prompt(&self, session_id: &str, request: PromptRequest) -> Result<PromptResponse> {
        let no_reply = request.no_reply;
        lock(&self.prompts).push(RecordedPrompt {
            session_id: session_id.to_string(),
            request,
        });
        if no_reply {
            return Ok(PromptResponse { info: None });
        }

        if let Some(message) = lock(&self.prompt_failure).clone() {
            return Err(BridgeError::Api(ApiError::ServerError {
                status: 500,
                message,
            }));
        }

        let message_id = self.next("msg");
        let script = lock(&self.script).clone();
        if let Some(script) = script {
            for event in script(session_id, &message_id) {
                self.emit(event);
            }
        }

        Ok(PromptResponse {
            info: Some(MessageInfo {
                id: message_id,
                role: "assistant".to_string(),
                session_id: Some(session_id.to_string()),
            }),
        })
    }

    async fn messages(&self, session_id: &str) -> Result<Vec<MessageWithParts>> {
        Ok(lock(&self.transcripts)
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn providers(&self) -> Result<Vec<ProviderInfo>> {
        Ok(lock(&self.providers).clone())
    }

    async fn agents(&self) -> Result<Vec<AgentInfo>> {
        Ok(lock(&self.agents).clone())
    }

    async fn health(&self) -> Result<HealthInfo> {
        Ok(HealthInfo {
            healthy: true,
            version: Some("mock".to_string()),
        })
    }

    async fn subscribe(&self) -> Result<EventStream> {
        let (tx, rx) = mpsc::unbounded_channel();
        lock(&self.subscribers).push(tx);
        Ok(Box::pin(UnboundedReceiverStream::new(rx)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_create_and_delete_session() {
        let mock = MockAgentService::new();
        let session = mock.create_session("Bridge-test", None).await.unwrap();
        assert!(mock.get_session(&session.id).await.unwrap().is_some());
        assert!(session.created_at().is_some());

        mock.delete_session(&session.id).await.unwrap();
        assert!(mock.get_session(&session.id).await.unwrap().is_none());
        assert!(mock.delete_session(&session.id).await.is_err());
    }

    #[tokio::test]
    async fn test_prompt_records_and_scripts_events() {
        let mock = MockAgentService::new().on_prompt(|session_id, _| {
            vec![Event::SessionIdle {
                session_id: session_id.to_string(),
            }]
        });
        let mut feed = mock.subscribe().await.unwrap();

        let silent = mock
            .prompt("ses_1", PromptRequest::silent("ctx"))
            .await
            .unwrap();
        assert!(silent.info.is_none());

        let reply = mock.prompt("ses_1", PromptRequest::text("hi")).await.unwrap();
        assert!(reply.info.unwrap().id.starts_with("msg_"));
        assert_eq!(mock.recorded_prompts().len(), 2);

        let event = feed.next().await.unwrap().unwrap();
        assert_eq!(event.session_id(), Some("ses_1"));
    }

    #[tokio::test]
    async fn test_failing_prompts() {
        let mock = MockAgentService::new().fail_prompts("boom");
        assert!(mock.prompt("ses_1", PromptRequest::silent("x")).await.is_ok());
        let err = mock
            .prompt("ses_1", PromptRequest::text("x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_close_feed_ends_stream() {
        let mock = MockAgentService::new();
        let mut feed = mock.subscribe().await.unwrap();
        assert_eq!(mock.subscriber_count(), 1);
        mock.close_feed();
        assert!(feed.next().await.is_none());
    }
}
