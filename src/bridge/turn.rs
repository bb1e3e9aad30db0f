// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Turn runner
//!
//! One user message, start to finish: resolve the agent session, register the
//! record, inject context, prompt, and hand the turn to the supervisor.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::identity::Origin;
use super::registry::{SessionRegistry, Tracked};
use super::resolver::SessionResolver;
use super::state::SessionSeed;
use super::supervisor::{Supervisor, TurnOutcome};
use super::BridgeOptions;
use crate::agent::{AgentService, PromptModel, PromptRequest};
use crate::error::Result;
use crate::gateway::MessagingGateway;
use crate::utils::preview;

/// Sent before every turn so the agent knows how to attach media.
pub const MEDIA_INSTRUCTIONS: &str = "\
To send media, include a standard element tag in your reply and it will render for the user.
Image: <img src='...'/>
Audio: <audio src='...'/>
Video: <video src='...'/>
File: <file src='...'/>
Do not wrap these tags in Markdown code blocks. If you are only asked to send a file, do not read it; just check that it exists.";

/// `[User: name (ID: id) | Platform: p]`
pub fn context_header(origin: &Origin) -> String {
    format!(
        "[User: {} (ID: {}) | Platform: {}]",
        origin.user_name,
        origin.user_id,
        origin.platform()
    )
}

pub fn processing_notice(message: &str) -> String {
    format!("🔄 Processing: {}", preview(message, 30))
}

pub struct TurnRunner {
    registry: Arc<SessionRegistry>,
    agent: Arc<dyn AgentService>,
    gateway: Arc<dyn MessagingGateway>,
    resolver: Arc<SessionResolver>,
    supervisor: Arc<Supervisor>,
    options: Arc<BridgeOptions>,
}

impl TurnRunner {
    pub fn new(
        registry: Arc<SessionRegistry>,
        agent: Arc<dyn AgentService>,
        gateway: Arc<dyn MessagingGateway>,
        resolver: Arc<SessionResolver>,
        supervisor: Arc<Supervisor>,
        options: Arc<BridgeOptions>,
    ) -> Self {
        Self {
            registry,
            agent,
            gateway,
            resolver,
            supervisor,
            options,
        }
    }

    /// Run one turn. Blank messages are ignored and yield `Ok(None)`.
    ///
    /// On failure the record is removed, the user gets an error notice and
    /// the error is returned.
    pub async fn run(
        &self,
        origin: &Origin,
        message: &str,
        shutdown: &CancellationToken,
    ) -> Result<Option<TurnOutcome>> {
        if message.trim().is_empty() {
            tracing::debug!(user_id = %origin.user_id, "ignoring blank message");
            return Ok(None);
        }

        let mut tracked = None;
        let result = self.drive(origin, message, shutdown, &mut tracked).await;

        match result {
            Ok(outcome) => {
                tracing::info!(user_id = %origin.user_id, outcome = outcome.as_str(), "turn ended");
                Ok(Some(outcome))
            }
            Err(err) => {
                tracing::error!(user_id = %origin.user_id, error = %err, "turn failed");
                if let Some(tracked) = tracked {
                    self.registry.remove_turn(&tracked.key, tracked.turn);
                }
                let notice = format!("❌ Agent error: {err}");
                if let Err(send_err) = self.gateway.send_message(&origin.target, &notice).await {
                    tracing::warn!(error = %send_err, "failed to deliver agent error");
                }
                Err(err)
            }
        }
    }

    async fn drive(
        &self,
        origin: &Origin,
        message: &str,
        shutdown: &CancellationToken,
        tracked_slot: &mut Option<Tracked>,
    ) -> Result<TurnOutcome> {
        let key = origin.key(&self.options.workspace);
        let session = self.resolver.resolve(&key).await?;
        tracing::info!(
            key = %key,
            session_id = %session.id,
            message = %preview(message, 50),
            "sending message"
        );

        let tracked = self
            .registry
            .upsert(SessionSeed {
                key,
                agent_session_id: session.id.clone(),
                target: origin.target.clone(),
            })
            .await?;
        *tracked_slot = Some(tracked.clone());

        if self.options.show_processing_message {
            self.gateway
                .send_message(&origin.target, &processing_notice(message))
                .await?;
        }

        self.agent
            .prompt(&session.id, PromptRequest::silent(MEDIA_INSTRUCTIONS))
            .await?;
        self.agent
            .prompt(&session.id, PromptRequest::silent(context_header(origin)))
            .await?;

        let model = self.options.model.clone().map(PromptModel::from);
        let response = self
            .agent
            .prompt(&session.id, PromptRequest::text(message).with_model(model))
            .await?;

        {
            let mut state = tracked.state.lock().await;
            if let Some(info) = response.info {
                self.registry.track_message(&info.id, &tracked.key);
                state.tracked_message_id = Some(info.id);
            }
            state.touch();
        }

        self.supervisor.supervise(&tracked, shutdown).await
    }
}
