// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Completion supervisor
//!
//! The event feed has no explicit end-of-turn signal, so each turn polls its
//! record until it goes idle, fails, or stalls past the inactivity budget.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::registry::{SessionRegistry, Tracked};
use super::state::{SessionState, SessionStatus};
use crate::agent::{AgentService, MessageWithParts, PartBody};
use crate::error::Result;
use crate::gateway::MessagingGateway;

pub const TIMEOUT_NOTICE: &str = "⚠️ Response timed out";
pub const NO_RESPONSE: &str = "[No response]";

/// How a supervised turn ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The agent went idle
    Completed,
    /// The agent reported an error
    Failed,
    /// No activity within the timeout
    TimedOut,
    /// The engine shut down
    Cancelled,
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnOutcome::Completed => "completed",
            TurnOutcome::Failed => "failed",
            TurnOutcome::TimedOut => "timed out",
            TurnOutcome::Cancelled => "cancelled",
        }
    }
}

/// Terminal check for one poll. Timeout fires once `now - last_activity`
/// reaches `timeout`.
pub fn check_terminal(state: &SessionState, now: Instant, timeout: Duration) -> Option<TurnOutcome> {
    match state.status {
        SessionStatus::Idle => Some(TurnOutcome::Completed),
        SessionStatus::Error => Some(TurnOutcome::Failed),
        SessionStatus::Busy if now.saturating_duration_since(state.last_activity) >= timeout => {
            Some(TurnOutcome::TimedOut)
        }
        SessionStatus::Busy => None,
    }
}

/// Text sent when nothing was streamed: the tracked message (or the last
/// one) with its text parts joined.
pub fn fallback_text(messages: &[MessageWithParts], tracked_message_id: Option<&str>) -> String {
    let message = tracked_message_id
        .and_then(|id| messages.iter().find(|m| m.info.id == id))
        .or_else(|| messages.last());
    let Some(message) = message else {
        return NO_RESPONSE.to_string();
    };

    let text = message.text();
    if text.is_empty() {
        return NO_RESPONSE.to_string();
    }
    let has_code = message
        .parts
        .iter()
        .any(|part| matches!(&part.body, PartBody::Other { kind } if kind == "code"));
    if has_code {
        format!("{text}\n\n*Contains code blocks*")
    } else {
        text
    }
}

pub struct Supervisor {
    registry: Arc<SessionRegistry>,
    agent: Arc<dyn AgentService>,
    gateway: Arc<dyn MessagingGateway>,
    poll_interval: Duration,
    timeout: Duration,
}

impl Supervisor {
    pub fn new(
        registry: Arc<SessionRegistry>,
        agent: Arc<dyn AgentService>,
        gateway: Arc<dyn MessagingGateway>,
        poll_interval: Duration,
        timeout: Duration,
    ) -> Self {
        Self {
            registry,
            agent,
            gateway,
            poll_interval,
            timeout,
        }
    }

    /// Poll until the record reaches a terminal state. No side effects.
    pub async fn watch(&self, tracked: &Tracked, shutdown: &CancellationToken) -> TurnOutcome {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => return TurnOutcome::Cancelled,
                _ = ticker.tick() => {}
            }

            if !self.registry.contains(&tracked.key) {
                tracing::debug!(key = %tracked.key, "session record gone, treating turn as complete");
                return TurnOutcome::Completed;
            }
            let state = tracked.state.lock().await;
            if let Some(outcome) = check_terminal(&state, Instant::now(), self.timeout) {
                return outcome;
            }
        }
    }

    /// Watch the turn, report its end to the user, and remove the record.
    pub async fn supervise(
        &self,
        tracked: &Tracked,
        shutdown: &CancellationToken,
    ) -> Result<TurnOutcome> {
        let outcome = self.watch(tracked, shutdown).await;
        tracing::debug!(key = %tracked.key, outcome = outcome.as_str(), "turn finished");

        let result = self.report(tracked, outcome).await;
        self.registry.remove_turn(&tracked.key, tracked.turn);
        result.map(|_| outcome)
    }

    async fn report(&self, tracked: &Tracked, outcome: TurnOutcome) -> Result<()> {
        let (target, agent_session_id, tracked_message_id, has_streamed) = {
            let state = tracked.state.lock().await;
            (
                state.target.clone(),
                state.agent_session_id.clone(),
                state.tracked_message_id.clone(),
                state.stream.has_streamed,
            )
        };

        match outcome {
            TurnOutcome::TimedOut => {
                tracing::warn!(
                    session_id = %agent_session_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "response timed out"
                );
                self.gateway.send_message(&target, TIMEOUT_NOTICE).await?;
            }
            TurnOutcome::Completed if !has_streamed => {
                let messages = self.agent.messages(&agent_session_id).await?;
                let text = fallback_text(&messages, tracked_message_id.as_deref());
                self.gateway.send_message(&target, &text).await?;
            }
            TurnOutcome::Completed | TurnOutcome::Failed | TurnOutcome::Cancelled => {}
        }
        Ok(())
    }
}
