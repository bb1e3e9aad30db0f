// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Mock messaging gateway for testing
//!
//! Records every send and edit, and can be told to reject them.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use super::{ChannelTarget, MessagingGateway};
use crate::error::{GatewayError, Result};

/// A message as it was sent
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel_id: String,
    pub handle: String,
    pub content: String,
}

/// An edit as it was applied
#[derive(Debug, Clone, PartialEq)]
pub struct EditedMessage {
    pub handle: String,
    pub content: String,
}

#[derive(Clone)]
pub struct MockGateway {
    supports_edit: bool,
    sent: Arc<Mutex<Vec<SentMessage>>>,
    edits: Arc<Mutex<Vec<EditedMessage>>>,
    /// Remaining sends to reject
    failing_sends: Arc<AtomicUsize>,
    fail_edits: Arc<AtomicBool>,
    next_handle: Arc<AtomicUsize>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("Mock gateway lock was poisoned, recovering");
            poisoned.into_inner()
        }
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// A send-only gateway
    pub fn new() -> Self {
        Self {
            supports_edit: false,
            sent: Arc::new(Mutex::new(Vec::new())),
            edits: Arc::new(Mutex::new(Vec::new())),
            failing_sends: Arc::new(AtomicUsize::new(0)),
            fail_edits: Arc::new(AtomicBool::new(false)),
            next_handle: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// A gateway that advertises in-place editing
    pub fn editable() -> Self {
        Self {
            supports_edit: true,
            ..Self::new()
        }
    }

    /// Reject every edit attempt while advertising edit support.
    pub fn with_failing_edits(self) -> Self {
        self.fail_edits.store(true, Ordering::SeqCst);
        self
    }

    /// Reject the next `count` sends.
    pub fn fail_next_sends(&self, count: usize) {
        self.failing_sends.store(count, Ordering::SeqCst);
    }

    pub fn set_fail_edits(&self, fail: bool) {
        self.fail_edits.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        lock(&self.sent).clone()
    }

    /// Contents of all sent messages, in order.
    pub fn sent_contents(&self) -> Vec<String> {
        lock(&self.sent).iter().map(|m| m.content.clone()).collect()
    }

    pub fn edits(&self) -> Vec<EditedMessage> {
        lock(&self.edits).clone()
    }

    /// Current content of a message, edits applied.
    pub fn content_of(&self, handle: &str) -> Option<String> {
        if let Some(edit) = lock(&self.edits).iter().rev().find(|e| e.handle == handle) {
            return Some(edit.content.clone());
        }
        lock(&self.sent)
            .iter()
            .find(|m| m.handle == handle)
            .map(|m| m.content.clone())
    }
}

#[async_trait]
impl MessagingGateway for MockGateway {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_edit(&self) -> bool {
        self.supports_edit
    }

    async fn send_message(&self, target: &ChannelTarget, content: &str) -> Result<Vec<String>> {
        let rejected = self
            .failing_sends
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if rejected {
            return Err(GatewayError::Rejected {
                operation: "send".to_string(),
                reason: "mock send failure".to_string(),
            }
            .into());
        }

        let handle = format!("h{}", self.next_handle.fetch_add(1, Ordering::SeqCst) + 1);
        lock(&self.sent).push(SentMessage {
            channel_id: target.channel_id.clone(),
            handle: handle.clone(),
            content: content.to_string(),
        });
        Ok(vec![handle])
    }

    async fn edit_message(&self, _target: &ChannelTarget, handle: &str, content: &str) -> Result<()> {
        if !self.supports_edit {
            return Err(GatewayError::EditUnsupported(self.name().to_string()).into());
        }
        if self.fail_edits.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                operation: "edit".to_string(),
                reason: "mock edit failure".to_string(),
            }
            .into());
        }
        lock(&self.edits).push(EditedMessage {
            handle: handle.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }
}
