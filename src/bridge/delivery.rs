// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Streaming delivery strategies
//!
//! Native mode edits one message in place; segmented mode sends the unsent
//! tail of the content in sentence-sized chunks. A native failure downgrades
//! the session to segmented mode for good, seeding the delivered record with
//! what the native message already showed.

use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::time::Instant;

use super::state::{SessionState, StreamMode};
use crate::config::{Settings, StreamModeSetting};
use crate::error::Result;
use crate::gateway::MessagingGateway;

/// Streaming knobs taken from [`Settings`]
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub enabled: bool,
    pub mode: StreamModeSetting,
    /// Minimum spacing between native edits
    pub interval: Duration,
}

impl StreamSettings {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enabled: settings.streaming.enabled,
            mode: settings.streaming.mode,
            interval: settings.stream_interval(),
        }
    }
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// Pick the strategy for a session. Auto checks the gateway's edit support.
pub fn resolve_mode(setting: StreamModeSetting, gateway: &dyn MessagingGateway) -> StreamMode {
    match setting {
        StreamModeSetting::Native => StreamMode::Native,
        StreamModeSetting::Segment => StreamMode::Segmented,
        StreamModeSetting::Auto => {
            if gateway.supports_edit() {
                StreamMode::Native
            } else {
                StreamMode::Segmented
            }
        }
    }
}

/// Deliver the latest `content` snapshot of `message_id`.
///
/// The resolved mode is cached on the state the first time it is needed.
/// Errors are segmented send failures; the cursor is left untouched so the
/// next flush retries.
pub async fn stream_content(
    state: &mut SessionState,
    gateway: &dyn MessagingGateway,
    settings: &StreamSettings,
    message_id: &str,
    content: &str,
    is_final: bool,
) -> Result<()> {
    state.stream.track(message_id);
    let mode = match state.stream.mode {
        Some(mode) => mode,
        None => {
            let mode = resolve_mode(settings.mode, gateway);
            tracing::debug!(key = %state.key, mode = mode.as_str(), "stream mode resolved");
            state.stream.mode = Some(mode);
            mode
        }
    };

    match mode {
        StreamMode::Native => {
            if deliver_native(state, gateway, content, settings.interval, is_final).await {
                Ok(())
            } else {
                deliver_segmented(state, gateway, content, is_final).await
            }
        }
        StreamMode::Segmented => deliver_segmented(state, gateway, content, is_final).await,
    }
}

/// Edit-in-place delivery. Returns `false` when the session was downgraded
/// and the content still needs segmented delivery.
async fn deliver_native(
    state: &mut SessionState,
    gateway: &dyn MessagingGateway,
    content: &str,
    interval: Duration,
    is_final: bool,
) -> bool {
    let now = Instant::now();
    let due = is_final
        || state.stream.handle.is_none()
        || state
            .stream
            .last_stream
            .map_or(true, |last| now.duration_since(last) > interval);
    if !due {
        return true;
    }

    let outcome = match state.stream.handle.clone() {
        Some(handle) => gateway
            .edit_message(&state.target, &handle, content)
            .await
            .map(|_| Some(handle)),
        None => gateway
            .send_message(&state.target, content)
            .await
            .map(|handles| handles.into_iter().next()),
    };

    match outcome {
        Ok(Some(handle)) => {
            state.stream.handle = Some(handle);
            state.stream.last_stream = Some(now);
            state.stream.native_rendered = content.to_string();
            state.stream.has_streamed = true;
            true
        }
        Ok(None) => {
            tracing::warn!(key = %state.key, "gateway returned no message handle, retrying on next flush");
            true
        }
        Err(err) => {
            tracing::warn!(
                key = %state.key,
                error = %err,
                "native streaming failed, downgrading to segmented"
            );
            state.stream.mode = Some(StreamMode::Segmented);
            let shown = std::mem::take(&mut state.stream.native_rendered);
            state.stream.advance(&shown, shown.len());
            false
        }
    }
}

/// Send the unsent tail of `content`, up to the last safe split point unless
/// this is the final flush.
async fn deliver_segmented(
    state: &mut SessionState,
    gateway: &dyn MessagingGateway,
    content: &str,
    is_final: bool,
) -> Result<()> {
    let resume = state.stream.resume_point(content);
    if resume != state.stream.cursor() {
        tracing::warn!(
            key = %state.key,
            delivered = state.stream.cursor(),
            resume,
            "streamed content changed before the cursor, resuming after delivered text"
        );
        state.stream.rebase(content, resume);
    }
    let unsent = content.get(resume..).unwrap_or_default();
    if unsent.is_empty() {
        return Ok(());
    }

    let take = if is_final {
        unsent.len()
    } else {
        segment_length(unsent)
    };
    if take == 0 {
        return Ok(());
    }

    let chunk = unsent[..take].trim();
    if !chunk.is_empty() {
        gateway.send_message(&state.target, chunk).await?;
        state.stream.has_streamed = true;
    }
    state.stream.advance(content, resume + take);
    Ok(())
}

fn sentence_end() -> &'static Regex {
    static SENTENCE_END: OnceLock<Regex> = OnceLock::new();
    SENTENCE_END.get_or_init(|| Regex::new(r"[A-Za-z][.!?]\s").expect("sentence regex is valid"))
}

fn open_media_tag() -> &'static Regex {
    static OPEN_MEDIA_TAG: OnceLock<Regex> = OnceLock::new();
    OPEN_MEDIA_TAG
        .get_or_init(|| Regex::new(r"(?i)<(?:img|audio|video|file)[^>]*$").expect("tag regex is valid"))
}

/// Byte offset just past the rightmost safe split point: a paragraph break,
/// CJK sentence punctuation, or a Latin sentence end followed by whitespace.
pub fn find_split_point(text: &str) -> Option<usize> {
    let paragraph = text.rfind("\n\n").map(|idx| idx + 2);
    let cjk = text
        .char_indices()
        .filter(|(_, c)| matches!(c, '。' | '！' | '？'))
        .last()
        .map(|(idx, c)| idx + c.len_utf8());
    // letter + punctuation are one byte each
    let latin = sentence_end().find_iter(text).last().map(|m| m.start() + 2);

    [paragraph, cjk, latin].into_iter().flatten().max()
}

/// Start of an unterminated media tag at the end of `text`, if any.
pub fn open_tag_start(text: &str) -> Option<usize> {
    open_media_tag().find(text).map(|m| m.start())
}

/// How many bytes of `unsent` may go out now; 0 withholds everything.
pub fn segment_length(unsent: &str) -> usize {
    let Some(split) = find_split_point(unsent) else {
        return 0;
    };
    match open_tag_start(&unsent[..split]) {
        Some(tag_start) => tag_start,
        None => split,
    }
}
