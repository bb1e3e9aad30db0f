// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session registry
//!
//! Maps identity keys to their live [`SessionState`] and keeps a reverse index
//! from agent message ids to keys. Records are shared as
//! `Arc<tokio::sync::Mutex<_>>`: every caller mutates the same record, and the
//! per-record lock serializes multi-field updates.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Mutex;

use super::identity::SessionKey;
use super::state::{SessionSeed, SessionState};
use crate::error::{BridgeError, Result};

pub type SharedState = Arc<Mutex<SessionState>>;

/// A resolved record with the turn generation it belongs to
#[derive(Clone)]
pub struct Tracked {
    pub key: SessionKey,
    pub turn: u64,
    pub state: SharedState,
}

struct Entry {
    agent_session_id: String,
    turn: u64,
    state: SharedState,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<SessionKey, Entry>,
    by_message: HashMap<String, SessionKey>,
}

#[derive(Default)]
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Session registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("Session registry lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Create the record for `seed.key`, or merge a new turn into the existing
    /// one. Dedup history is never dropped.
    ///
    /// Fails when another live key already streams from the same agent
    /// session: events carry only the agent session id, so two owners could
    /// not be told apart.
    pub async fn upsert(&self, seed: SessionSeed) -> Result<Tracked> {
        let (tracked, existed) = {
            let mut inner = self.write();
            let claimed_by = inner
                .sessions
                .iter()
                .find(|(key, entry)| {
                    entry.agent_session_id == seed.agent_session_id && **key != seed.key
                })
                .map(|(key, _)| key.clone());
            if let Some(owner) = claimed_by {
                tracing::warn!(
                    key = %seed.key,
                    owner = %owner,
                    session_id = %seed.agent_session_id,
                    "agent session already has an active conversation"
                );
                return Err(BridgeError::Session(format!(
                    "session {} is busy with another conversation",
                    seed.agent_session_id
                )));
            }
            match inner.sessions.get_mut(&seed.key) {
                Some(entry) => {
                    entry.turn += 1;
                    entry.agent_session_id = seed.agent_session_id.clone();
                    let tracked = Tracked {
                        key: seed.key.clone(),
                        turn: entry.turn,
                        state: Arc::clone(&entry.state),
                    };
                    (tracked, true)
                }
                None => {
                    let state = Arc::new(Mutex::new(SessionState::new(seed.clone())));
                    inner.sessions.insert(
                        seed.key.clone(),
                        Entry {
                            agent_session_id: seed.agent_session_id.clone(),
                            turn: 1,
                            state: Arc::clone(&state),
                        },
                    );
                    let tracked = Tracked {
                        key: seed.key.clone(),
                        turn: 1,
                        state,
                    };
                    (tracked, false)
                }
            }
        };

        if existed {
            tracked.state.lock().await.begin_turn(seed);
        }
        tracing::debug!(key = %tracked.key, turn = tracked.turn, merged = existed, "session upserted");
        Ok(tracked)
    }

    pub fn get(&self, key: &SessionKey) -> Option<Tracked> {
        self.read().sessions.get(key).map(|entry| Tracked {
            key: key.clone(),
            turn: entry.turn,
            state: Arc::clone(&entry.state),
        })
    }

    /// Linear scan; returns the shared record, never a copy.
    pub fn find_by_agent_session_id(&self, agent_session_id: &str) -> Option<Tracked> {
        self.read()
            .sessions
            .iter()
            .find(|(_, entry)| entry.agent_session_id == agent_session_id)
            .map(|(key, entry)| Tracked {
                key: key.clone(),
                turn: entry.turn,
                state: Arc::clone(&entry.state),
            })
    }

    /// Point `message_id` at `key` in the reverse index.
    pub fn track_message(&self, message_id: &str, key: &SessionKey) {
        let mut inner = self.write();
        if inner.sessions.contains_key(key) {
            inner.by_message.insert(message_id.to_string(), key.clone());
        }
    }

    pub fn find_by_message_id(&self, message_id: &str) -> Option<Tracked> {
        let inner = self.read();
        let key = inner.by_message.get(message_id)?;
        inner.sessions.get(key).map(|entry| Tracked {
            key: key.clone(),
            turn: entry.turn,
            state: Arc::clone(&entry.state),
        })
    }

    /// Tiered lookup: agent session id first, then the reverse message index.
    pub fn resolve(&self, session_id: Option<&str>, message_id: Option<&str>) -> Option<Tracked> {
        session_id
            .and_then(|id| self.find_by_agent_session_id(id))
            .or_else(|| message_id.and_then(|id| self.find_by_message_id(id)))
    }

    /// Remove a record and every reverse-index entry pointing at it.
    pub fn remove(&self, key: &SessionKey) -> Option<SharedState> {
        let mut inner = self.write();
        let entry = inner.sessions.remove(key)?;
        inner.by_message.retain(|_, k| k != key);
        tracing::debug!(key = %key, "session removed");
        Some(entry.state)
    }

    /// Remove the record only if no newer turn has been merged into it.
    pub fn remove_turn(&self, key: &SessionKey, turn: u64) -> bool {
        let mut inner = self.write();
        match inner.sessions.get(key).map(|entry| entry.turn) {
            Some(current) if current == turn => {
                inner.sessions.remove(key);
                inner.by_message.retain(|_, k| k != key);
                tracing::debug!(key = %key, turn, "session removed");
                true
            }
            Some(current) => {
                tracing::debug!(key = %key, turn, current, "newer turn active, keeping session");
                false
            }
            None => false,
        }
    }

    /// Whether `tracked` still points at the live record for its key. False
    /// once the record was removed, even if the key was registered again.
    pub fn is_current(&self, tracked: &Tracked) -> bool {
        self.read()
            .sessions
            .get(&tracked.key)
            .is_some_and(|entry| Arc::ptr_eq(&entry.state, &tracked.state))
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.sessions.clear();
        inner.by_message.clear();
    }

    pub fn contains(&self, key: &SessionKey) -> bool {
        self.read().sessions.contains_key(key)
    }

    pub fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<_> = self.read().sessions.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().sessions.is_empty()
    }

    /// Number of reverse-index entries
    pub fn indexed_messages(&self) -> usize {
        self.read().by_message.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::ChannelTarget;

    fn seed(user: &str, agent_session_id: &str) -> SessionSeed {
        SessionSeed {
            key: SessionKey::new("test", user, "/w"),
            agent_session_id: agent_session_id.to_string(),
            target: ChannelTarget::new("test", "c1"),
        }
    }

    #[tokio::test]
    async fn test_upsert_returns_shared_record() {
        let registry = SessionRegistry::new();
        let first = registry.upsert(seed("u1", "ses_1")).await.unwrap();
        first
            .state
            .lock()
            .await
            .sent_final_messages
            .insert("m1".to_string());

        let found = registry.find_by_agent_session_id("ses_1").unwrap();
        assert!(Arc::ptr_eq(&first.state, &found.state));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_upsert_merges_and_bumps_turn() {
        let registry = SessionRegistry::new();
        let first = registry.upsert(seed("u1", "ses_1")).await.unwrap();
        first
            .state
            .lock()
            .await
            .sent_tool_calls
            .insert("p1".to_string());

        let second = registry.upsert(seed("u1", "ses_2")).await.unwrap();
        assert_eq!(second.turn, first.turn + 1);
        assert!(Arc::ptr_eq(&first.state, &second.state));

        let state = second.state.lock().await;
        assert!(state.sent_tool_calls.contains("p1"));
        assert_eq!(state.agent_session_id, "ses_2");
        drop(state);

        assert!(registry.find_by_agent_session_id("ses_1").is_none());
        assert!(registry.find_by_agent_session_id("ses_2").is_some());
    }

    #[tokio::test]
    async fn test_remove_prunes_reverse_index() {
        let registry = SessionRegistry::new();
        let a = registry.upsert(seed("u1", "ses_1")).await.unwrap();
        let b = registry.upsert(seed("u2", "ses_2")).await.unwrap();
        registry.track_message("m1", &a.key);
        registry.track_message("m2", &a.key);
        registry.track_message("m3", &b.key);
        assert_eq!(registry.indexed_messages(), 3);

        registry.remove(&a.key);
        assert!(registry.find_by_message_id("m1").is_none());
        assert!(registry.find_by_message_id("m2").is_none());
        assert!(registry.find_by_message_id("m3").is_some());
        assert_eq!(registry.indexed_messages(), 1);
    }

    #[tokio::test]
    async fn test_track_message_for_unknown_key_is_ignored() {
        let registry = SessionRegistry::new();
        registry.track_message("m1", &SessionKey::new("test", "ghost", "/w"));
        assert_eq!(registry.indexed_messages(), 0);
    }

    #[tokio::test]
    async fn test_resolve_prefers_session_id() {
        let registry = SessionRegistry::new();
        let a = registry.upsert(seed("u1", "ses_1")).await.unwrap();
        let b = registry.upsert(seed("u2", "ses_2")).await.unwrap();
        registry.track_message("m_b", &b.key);

        let resolved = registry.resolve(Some("ses_1"), Some("m_b")).unwrap();
        assert_eq!(resolved.key, a.key);

        let by_message = registry.resolve(Some("ses_unknown"), Some("m_b")).unwrap();
        assert_eq!(by_message.key, b.key);

        assert!(registry.resolve(None, None).is_none());
    }

    #[tokio::test]
    async fn test_remove_turn_keeps_newer_turn() {
        let registry = SessionRegistry::new();
        let first = registry.upsert(seed("u1", "ses_1")).await.unwrap();
        let second = registry.upsert(seed("u1", "ses_1")).await.unwrap();

        assert!(!registry.remove_turn(&first.key, first.turn));
        assert!(registry.contains(&first.key));
        assert!(registry.remove_turn(&second.key, second.turn));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_is_current_after_reregistration() {
        let registry = SessionRegistry::new();
        let old = registry.upsert(seed("u1", "ses_1")).await.unwrap();
        assert!(registry.is_current(&old));

        registry.remove(&old.key);
        let fresh = registry.upsert(seed("u1", "ses_1")).await.unwrap();
        assert!(!registry.is_current(&old));
        assert!(registry.is_current(&fresh));
    }

    #[tokio::test]
    async fn test_upsert_rejects_second_owner_of_agent_session() {
        let registry = SessionRegistry::new();
        let alice = registry.upsert(seed("alice", "ses_shared")).await.unwrap();

        let err = registry.upsert(seed("bob", "ses_shared")).await;
        assert!(matches!(err, Err(BridgeError::Session(_))));
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.find_by_agent_session_id("ses_shared").unwrap().key,
            alice.key
        );

        // Free again once the first conversation ends.
        registry.remove(&alice.key);
        assert!(registry.upsert(seed("bob", "ses_shared")).await.is_ok());
    }

    #[tokio::test]
    async fn test_clear() {
        let registry = SessionRegistry::new();
        let a = registry.upsert(seed("u1", "ses_1")).await.unwrap();
        registry.track_message("m1", &a.key);
        registry.clear();
        assert!(registry.is_empty());
        assert_eq!(registry.indexed_messages(), 0);
        assert!(registry.keys().is_empty());
    }
}
