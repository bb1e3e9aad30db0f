// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session identity: who is talking, where, and about which workspace

use std::fmt;

use crate::gateway::ChannelTarget;

/// Derived identity of a conversation: platform + user + workspace fingerprint
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    pub platform: String,
    pub user_id: String,
    pub workspace: String,
}

impl SessionKey {
    pub fn new(platform: impl Into<String>, user_id: impl Into<String>, workspace: &str) -> Self {
        Self {
            platform: platform.into(),
            user_id: user_id.into(),
            workspace: fingerprint(workspace),
        }
    }

    /// Title prefix of agent sessions owned by this identity
    pub fn title_prefix(&self) -> String {
        format!("Bridge-{}-{}-{}", self.platform, self.user_id, self.workspace)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}-{}", self.platform, self.user_id, self.workspace)
    }
}

/// Where a user message came from
#[derive(Debug, Clone, PartialEq)]
pub struct Origin {
    pub user_id: String,
    pub user_name: String,
    pub target: ChannelTarget,
}

impl Origin {
    pub fn new(
        user_id: impl Into<String>,
        user_name: impl Into<String>,
        target: ChannelTarget,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            target,
        }
    }

    pub fn platform(&self) -> &str {
        &self.target.platform
    }

    pub fn key(&self, workspace: &str) -> SessionKey {
        SessionKey::new(self.platform(), self.user_id.clone(), workspace)
    }
}

/// Short, stable base-36 fingerprint of a workspace path.
///
/// 32-bit multiplicative string hash over UTF-16 code units, so fingerprints
/// match titles created by earlier bridge deployments.
pub fn fingerprint(input: &str) -> String {
    let hash = input.encode_utf16().fold(0i32, |hash, unit| {
        hash.wrapping_shl(5)
            .wrapping_sub(hash)
            .wrapping_add(i32::from(unit))
    });
    to_base36(i64::from(hash).unsigned_abs())
}

fn to_base36(mut value: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
