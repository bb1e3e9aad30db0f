// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session resolver
//!
//! Decides which agent session a chat identity talks to: a verified cached
//! binding, the newest session titled for the identity, or a freshly created
//! one. Identities never share a session implicitly; a fixed session is
//! applied by binding one key to it.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::identity::SessionKey;
use crate::agent::{AgentService, SessionInfo};
use crate::error::Result;

pub struct SessionResolver {
    agent: Arc<dyn AgentService>,
    directory: Option<String>,
    bindings: RwLock<HashMap<SessionKey, String>>,
}

impl SessionResolver {
    pub fn new(agent: Arc<dyn AgentService>, directory: Option<String>) -> Self {
        Self {
            agent,
            directory,
            bindings: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<SessionKey, String>> {
        match self.bindings.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SessionKey, String>> {
        match self.bindings.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn bind(&self, key: &SessionKey, session_id: impl Into<String>) {
        self.write().insert(key.clone(), session_id.into());
    }

    pub fn bound(&self, key: &SessionKey) -> Option<String> {
        self.read().get(key).cloned()
    }

    /// Drop every binding to a deleted session.
    pub fn forget_session(&self, session_id: &str) {
        self.write().retain(|_, id| id != session_id);
    }

    /// The agent session for `key`, creating one if needed.
    pub async fn resolve(&self, key: &SessionKey) -> Result<SessionInfo> {
        if let Some(id) = self.bound(key) {
            if let Some(session) = self.verify(&id).await {
                return Ok(session);
            }
            tracing::debug!(key = %key, session_id = %id, "cached session binding is stale");
            self.write().remove(key);
        }

        match self.agent.list_sessions().await {
            Ok(sessions) => {
                if let Some(session) = newest_titled(sessions, &key.title_prefix()) {
                    tracing::debug!(key = %key, session_id = %session.id, "reusing titled session");
                    self.bind(key, session.id.clone());
                    return Ok(session);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "session list failed, creating a new session");
            }
        }

        self.create_fresh(key).await
    }

    /// Create a new session for `key` and bind it.
    pub async fn create_fresh(&self, key: &SessionKey) -> Result<SessionInfo> {
        let title = format!(
            "{}-{}",
            key.title_prefix(),
            chrono::Utc::now().timestamp_millis()
        );
        let session = self
            .agent
            .create_session(&title, self.directory.as_deref())
            .await?;
        tracing::info!(key = %key, session_id = %session.id, "created agent session");
        self.bind(key, session.id.clone());
        Ok(session)
    }

    async fn verify(&self, session_id: &str) -> Option<SessionInfo> {
        match self.agent.get_session(session_id).await {
            Ok(session) => session,
            Err(err) => {
                tracing::debug!(session_id, error = %err, "session lookup failed");
                None
            }
        }
    }
}

/// Trailing `-<millis>` of a session title.
fn title_timestamp(title: &str) -> Option<i64> {
    title
        .rsplit('-')
        .next()
        .and_then(|tail| tail.parse::<i64>().ok())
        .filter(|ts| *ts > 0)
}

/// Newest session titled `prefix` or `prefix-...`: by title timestamp when
/// both have one, otherwise by creation time.
pub fn newest_titled(sessions: Vec<SessionInfo>, prefix: &str) -> Option<SessionInfo> {
    let mut candidates: Vec<SessionInfo> = sessions
        .into_iter()
        .filter(|s| {
            s.title
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('-'))
        })
        .collect();
    candidates.sort_by(|a, b| {
        match (title_timestamp(&a.title), title_timestamp(&b.title)) {
            (Some(ta), Some(tb)) => tb.cmp(&ta),
            _ => b.created_at().cmp(&a.created_at()),
        }
    });
    candidates.into_iter().next()
}
