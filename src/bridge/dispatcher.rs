// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Event dispatcher
//!
//! Resolves each feed event to its session record and applies it. Resolution
//! is synchronous and cheap so the stream consumer never waits on delivery;
//! application happens under the record's lock.

use std::sync::Arc;

use super::assembler::handle_part;
use super::registry::{SessionRegistry, Tracked};
use super::state::SessionStatus;
use super::BridgeOptions;
use crate::agent::Event;
use crate::gateway::MessagingGateway;

pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    gateway: Arc<dyn MessagingGateway>,
    options: Arc<BridgeOptions>,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<SessionRegistry>,
        gateway: Arc<dyn MessagingGateway>,
        options: Arc<BridgeOptions>,
    ) -> Self {
        Self {
            registry,
            gateway,
            options,
        }
    }

    /// Find the record an event belongs to: agent session id first, then the
    /// reverse message index.
    pub fn route(&self, event: &Event) -> Option<Tracked> {
        match event {
            Event::SessionCreated { session }
            | Event::SessionDeleted { session }
            | Event::SessionUpdated { session } => {
                tracing::debug!(kind = event.kind(), session_id = %session.id, "session lifecycle event");
                None
            }
            Event::SessionDiff { session_id } => {
                tracing::trace!(session_id = ?session_id, "session diff");
                None
            }
            Event::Other { kind, .. } => {
                tracing::trace!(kind = %kind, "unhandled event");
                None
            }
            _ => {
                let tracked = self.registry.resolve(event.session_id(), event.message_id());
                if tracked.is_none() {
                    tracing::debug!(
                        kind = event.kind(),
                        session_id = ?event.session_id(),
                        message_id = ?event.message_id(),
                        "no active session for event"
                    );
                }
                tracked
            }
        }
    }

    /// Apply a routed event to its record.
    pub async fn apply(&self, tracked: &Tracked, event: Event) {
        let mut state = tracked.state.lock().await;
        if !self.registry.is_current(tracked) {
            tracing::debug!(key = %tracked.key, kind = event.kind(), "session ended before event was applied");
            return;
        }
        state.touch();

        match event {
            Event::PartUpdated { part } => {
                if let Some(message_id) = part.message_id.as_deref() {
                    if state.is_user_message(message_id) {
                        tracing::trace!(message_id, "ignoring echoed user part");
                        return;
                    }
                }
                handle_part(&mut state, &part, self.gateway.as_ref(), &self.options).await;
            }
            Event::MessageUpdated { info } => {
                if !info.role.is_empty() {
                    state.message_roles.insert(info.id.clone(), info.role.clone());
                }
                if info.role != "user" {
                    self.registry.track_message(&info.id, &tracked.key);
                }
            }
            Event::SessionStatus { session_id, status } => {
                tracing::debug!(session_id = %session_id, status = %status, "session status");
                state.status = SessionStatus::from_wire(&status);
            }
            Event::SessionIdle { session_id } => {
                tracing::debug!(session_id = %session_id, "session idle");
                state.status = SessionStatus::Idle;
            }
            Event::SessionError { session_id, message } => {
                tracing::error!(session_id = ?session_id, error = %message, "agent session error");
                state.status = SessionStatus::Error;
                let notice = format!("❌ Session error: {message}");
                if let Err(err) = self.gateway.send_message(&state.target, &notice).await {
                    tracing::warn!(key = %tracked.key, error = %err, "failed to deliver session error");
                }
            }
            other => {
                tracing::trace!(kind = other.kind(), "event ignored");
            }
        }
    }

    /// Route and apply in one step. Returns whether the event matched a
    /// session.
    pub async fn dispatch(&self, event: Event) -> bool {
        match self.route(&event) {
            Some(tracked) => {
                self.apply(&tracked, event).await;
                true
            }
            None => false,
        }
    }
}
