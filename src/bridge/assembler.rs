// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Part assembler
//!
//! Folds part snapshots into per-message buffers and decides what to flush.
//! Text, reasoning and step-finish go through the streaming strategies; tool
//! and other parts are sent standalone, gated by their dedup key.

use super::delivery::stream_content;
use super::format::{format_part, format_reasoning};
use super::state::{PartialMessage, SessionState};
use super::BridgeOptions;
use crate::agent::{Part, PartBody, ToolStatus};
use crate::gateway::MessagingGateway;

/// Apply one part update to `state`, delivering whatever became flushable.
pub async fn handle_part(
    state: &mut SessionState,
    part: &Part,
    gateway: &dyn MessagingGateway,
    options: &BridgeOptions,
) {
    let Some(message_id) = part.message_id.clone() else {
        handle_unattached(state, part, gateway, options).await;
        return;
    };

    match &part.body {
        PartBody::Text { text } => {
            state.partial(&message_id).text = text.clone();
            stream_snapshot(state, &message_id, gateway, options, false).await;
        }
        PartBody::Reasoning { text } => {
            state.partial(&message_id).reasoning = text.clone();
            stream_snapshot(state, &message_id, gateway, options, false).await;
        }
        PartBody::StepFinish { .. } => {
            if state.sent_final_messages.contains(&message_id) {
                tracing::debug!(message_id = %message_id, "step already flushed");
                return;
            }
            if options.streaming.enabled {
                stream_snapshot(state, &message_id, gateway, options, true).await;
            } else {
                send_final(state, &message_id, gateway, options).await;
            }
        }
        PartBody::Tool {
            call_id,
            tool,
            state: tool_state,
        } => {
            if !options.show_tool_messages || tool_state.status == ToolStatus::Pending {
                return;
            }
            let call_id = call_id.as_deref().unwrap_or("unknown");
            let status = tool_state.status;
            if state.tool_states.get(call_id) == Some(&status) {
                return;
            }
            tracing::debug!(call_id, tool = %tool, status = %status, "tool status changed");

            let rendered = format_part(part, options.show_reasoning);
            let dedup_key = format!("{}:{}", part.id.as_deref().unwrap_or(call_id), status);
            // A failed send leaves the status unrecorded so a replay retries it.
            if send_once(state, dedup_key, &rendered, gateway).await {
                state.tool_states.insert(call_id.to_string(), status);
            }
        }
        _ => {
            let rendered = format_part(part, options.show_reasoning);
            let dedup_key = part
                .id
                .clone()
                .unwrap_or_else(|| format!("{}:{}", message_id, part.kind()));
            send_once(state, dedup_key, &rendered, gateway).await;
        }
    }
}

/// Reasoning block followed by the text, separated by a blank line.
pub fn compose(partial: &PartialMessage, show_reasoning: bool) -> String {
    let mut blocks = Vec::new();
    if show_reasoning && !partial.reasoning.is_empty() {
        blocks.push(format_reasoning(&partial.reasoning, true));
    }
    if !partial.text.is_empty() {
        blocks.push(partial.text.clone());
    }
    blocks.join("\n\n")
}

fn composed(state: &SessionState, message_id: &str, show_reasoning: bool) -> String {
    state
        .partial_messages
        .get(message_id)
        .map(|partial| compose(partial, show_reasoning))
        .unwrap_or_default()
}

async fn stream_snapshot(
    state: &mut SessionState,
    message_id: &str,
    gateway: &dyn MessagingGateway,
    options: &BridgeOptions,
    is_final: bool,
) {
    if !options.streaming.enabled {
        return;
    }
    let content = composed(state, message_id, options.show_reasoning);
    if content.is_empty() {
        return;
    }

    let result = stream_content(
        state,
        gateway,
        &options.streaming,
        message_id,
        &content,
        is_final,
    )
    .await;
    match result {
        Ok(()) if is_final => {
            if state.stream.covers(&content) {
                state.sent_final_messages.insert(message_id.to_string());
            } else {
                tracing::warn!(key = %state.key, message_id, "final flush left content unshown");
            }
        }
        Ok(()) => {}
        Err(err) => {
            tracing::warn!(
                key = %state.key,
                message_id,
                error = %err,
                "segment delivery failed, will retry on next flush"
            );
        }
    }
}

/// Streaming disabled: the whole message goes out once, at step-finish.
async fn send_final(
    state: &mut SessionState,
    message_id: &str,
    gateway: &dyn MessagingGateway,
    options: &BridgeOptions,
) {
    let content = composed(state, message_id, options.show_reasoning);
    if content.is_empty() {
        return;
    }
    match gateway.send_message(&state.target, &content).await {
        Ok(_) => {
            state.sent_final_messages.insert(message_id.to_string());
            state.stream.has_streamed = true;
        }
        Err(err) => {
            tracing::warn!(key = %state.key, message_id, error = %err, "final message delivery failed");
        }
    }
}

/// Send `rendered` unless empty or `dedup_key` was already delivered.
/// Returns false only when the send failed.
async fn send_once(
    state: &mut SessionState,
    dedup_key: String,
    rendered: &str,
    gateway: &dyn MessagingGateway,
) -> bool {
    if rendered.is_empty() || state.sent_tool_calls.contains(&dedup_key) {
        return true;
    }
    match gateway.send_message(&state.target, rendered).await {
        Ok(_) => {
            state.sent_tool_calls.insert(dedup_key);
            state.stream.has_streamed = true;
            true
        }
        Err(err) => {
            tracing::warn!(key = %state.key, dedup_key = %dedup_key, error = %err, "part delivery failed");
            false
        }
    }
}

/// Parts without a message id cannot be buffered; render and send them as is.
async fn handle_unattached(
    state: &mut SessionState,
    part: &Part,
    gateway: &dyn MessagingGateway,
    options: &BridgeOptions,
) {
    if matches!(part.body, PartBody::Tool { .. }) && !options.show_tool_messages {
        return;
    }
    let rendered = format_part(part, options.show_reasoning);
    let dedup_key = part
        .id
        .clone()
        .unwrap_or_else(|| format!("{}:{}", state.agent_session_id, part.kind()));
    send_once(state, dedup_key, &rendered, gateway).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::ToolState;
    use crate::bridge::identity::SessionKey;
    use crate::bridge::state::SessionSeed;
    use crate::config::StreamModeSetting;
    use crate::gateway::{ChannelTarget, MockGateway};

    fn state() -> SessionState {
        SessionState::new(SessionSeed {
            key: SessionKey::new("test", "u1", "/w"),
            agent_session_id: "ses_1".to_string(),
            target: ChannelTarget::new("test", "c1"),
        })
    }

    fn options(mode: StreamModeSetting) -> BridgeOptions {
        let mut options = BridgeOptions::default();
        options.streaming.mode = mode;
        options
    }

    fn text(message_id: &str, text: &str) -> Part {
        Part::new(PartBody::Text {
            text: text.to_string(),
        })
        .in_message(message_id)
    }

    fn finish(message_id: &str) -> Part {
        Part::new(PartBody::StepFinish {
            success: Some(true),
            title: None,
        })
        .in_message(message_id)
    }

    fn tool(status: ToolStatus) -> Part {
        Part::new(PartBody::Tool {
            call_id: Some("c1".to_string()),
            tool: "bash".to_string(),
            state: ToolState::with_status(status),
        })
        .with_id("prt_tool")
        .in_message("m1")
    }

    #[test]
    fn test_compose_reasoning_and_text() {
        let partial = PartialMessage {
            text: "Answer".to_string(),
            reasoning: "Hmm".to_string(),
        };
        assert_eq!(compose(&partial, true), "🤔 Thinking: Hmm\n\nAnswer");
        assert_eq!(compose(&partial, false), "Answer");
        assert_eq!(compose(&PartialMessage::default(), true), "");
    }

    #[tokio::test]
    async fn test_snapshots_overwrite_buffer() {
        let gateway = MockGateway::new();
        let options = options(StreamModeSetting::Segment);
        let mut state = state();

        handle_part(&mut state, &text("m1", "Hel"), &gateway, &options).await;
        handle_part(&mut state, &text("m1", "Hello"), &gateway, &options).await;
        assert_eq!(state.partial_messages["m1"].text, "Hello");

        handle_part(&mut state, &finish("m1"), &gateway, &options).await;
        assert_eq!(gateway.sent_contents(), vec!["Hello".to_string()]);
        assert!(state.sent_final_messages.contains("m1"));
    }

    #[tokio::test]
    async fn test_repeated_step_finish_is_ignored() {
        let gateway = MockGateway::new();
        let options = options(StreamModeSetting::Segment);
        let mut state = state();

        handle_part(&mut state, &text("m1", "Hi"), &gateway, &options).await;
        handle_part(&mut state, &finish("m1"), &gateway, &options).await;
        handle_part(&mut state, &finish("m1"), &gateway, &options).await;
        assert_eq!(gateway.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_tool_status_changes_are_delivered_once() {
        let gateway = MockGateway::new();
        let options = options(StreamModeSetting::Segment);
        let mut state = state();

        handle_part(&mut state, &tool(ToolStatus::Pending), &gateway, &options).await;
        handle_part(&mut state, &tool(ToolStatus::Running), &gateway, &options).await;
        handle_part(&mut state, &tool(ToolStatus::Completed), &gateway, &options).await;
        handle_part(&mut state, &tool(ToolStatus::Completed), &gateway, &options).await;

        assert_eq!(
            gateway.sent_contents(),
            vec![
                "🔧 Running tool: bash".to_string(),
                "✅ Tool bash finished".to_string()
            ]
        );
        assert_eq!(state.tool_states["c1"], ToolStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_tool_status_is_retried() {
        let gateway = MockGateway::new();
        let options = options(StreamModeSetting::Segment);
        let mut state = state();

        gateway.fail_next_sends(1);
        handle_part(&mut state, &tool(ToolStatus::Running), &gateway, &options).await;
        assert!(gateway.sent().is_empty());
        assert!(!state.tool_states.contains_key("c1"));

        handle_part(&mut state, &tool(ToolStatus::Running), &gateway, &options).await;
        assert_eq!(gateway.sent_contents(), vec!["🔧 Running tool: bash".to_string()]);
        assert_eq!(state.tool_states["c1"], ToolStatus::Running);
    }

    #[tokio::test]
    async fn test_hidden_tool_messages() {
        let gateway = MockGateway::new();
        let mut options = options(StreamModeSetting::Segment);
        options.show_tool_messages = false;
        let mut state = state();

        handle_part(&mut state, &tool(ToolStatus::Running), &gateway, &options).await;
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_streaming_disabled_sends_whole_message_at_finish() {
        let gateway = MockGateway::editable();
        let mut options = options(StreamModeSetting::Auto);
        options.streaming.enabled = false;
        let mut state = state();

        let reasoning = Part::new(PartBody::Reasoning {
            text: "plan".to_string(),
        })
        .in_message("m1");
        handle_part(&mut state, &reasoning, &gateway, &options).await;
        handle_part(&mut state, &text("m1", "First. Second."), &gateway, &options).await;
        assert!(gateway.sent().is_empty());

        handle_part(&mut state, &finish("m1"), &gateway, &options).await;
        assert_eq!(
            gateway.sent_contents(),
            vec!["🤔 Thinking: plan\n\nFirst. Second.".to_string()]
        );
        assert!(state.stream.has_streamed);
    }

    #[tokio::test]
    async fn test_other_parts_deduplicated_by_id() {
        let gateway = MockGateway::new();
        let options = options(StreamModeSetting::Segment);
        let mut state = state();

        let patch = Part::new(PartBody::Patch {
            hash: Some("abc".to_string()),
            files: vec!["a.rs".to_string()],
        })
        .with_id("prt_patch")
        .in_message("m1");
        handle_part(&mut state, &patch, &gateway, &options).await;
        handle_part(&mut state, &patch, &gateway, &options).await;

        let step_start = Part::new(PartBody::StepStart {}).in_message("m1");
        handle_part(&mut state, &step_start, &gateway, &options).await;

        assert_eq!(gateway.sent_contents(), vec!["📦 Patch (abc): a.rs".to_string()]);
    }

    #[tokio::test]
    async fn test_unattached_parts_use_session_dedup_key() {
        let gateway = MockGateway::new();
        let options = options(StreamModeSetting::Segment);
        let mut state = state();

        let agent = Part::new(PartBody::Agent {
            name: Some("explore".to_string()),
        });
        handle_part(&mut state, &agent, &gateway, &options).await;
        handle_part(&mut state, &agent, &gateway, &options).await;

        assert_eq!(gateway.sent_contents(), vec!["🤖 Subagent: explore".to_string()]);
        assert!(state.sent_tool_calls.contains("ses_1:agent"));
    }

    #[tokio::test]
    async fn test_late_reasoning_does_not_swallow_text_tail() {
        let gateway = MockGateway::new();
        let mut options = options(StreamModeSetting::Segment);
        options.show_reasoning = true;
        let mut state = state();

        let reasoning = Part::new(PartBody::Reasoning {
            text: "ab".to_string(),
        })
        .in_message("m1");
        handle_part(&mut state, &text("m1", "你好你好你好。再"), &gateway, &options).await;
        handle_part(&mut state, &reasoning, &gateway, &options).await;
        handle_part(&mut state, &text("m1", "你好你好你好。再见了朋友"), &gateway, &options).await;
        handle_part(&mut state, &finish("m1"), &gateway, &options).await;

        assert_eq!(
            gateway.sent_contents(),
            vec!["你好你好你好。".to_string(), "再见了朋友".to_string()]
        );
        assert!(state.sent_final_messages.contains("m1"));
        assert!(state.stream.has_streamed);
    }

    #[tokio::test]
    async fn test_blank_final_flush_leaves_fallback_armed() {
        let gateway = MockGateway::new();
        let options = options(StreamModeSetting::Segment);
        let mut state = state();

        handle_part(&mut state, &text("m1", "  \n"), &gateway, &options).await;
        handle_part(&mut state, &finish("m1"), &gateway, &options).await;

        assert!(gateway.sent().is_empty());
        assert!(!state.stream.has_streamed);
    }

    #[tokio::test]
    async fn test_failed_final_segment_is_retried_on_replay() {
        let gateway = MockGateway::new();
        let options = options(StreamModeSetting::Segment);
        let mut state = state();

        handle_part(&mut state, &text("m1", "All done"), &gateway, &options).await;
        gateway.fail_next_sends(1);
        handle_part(&mut state, &finish("m1"), &gateway, &options).await;
        assert!(!state.sent_final_messages.contains("m1"));

        handle_part(&mut state, &finish("m1"), &gateway, &options).await;
        assert_eq!(gateway.sent_contents(), vec!["All done".to_string()]);
        assert!(state.sent_final_messages.contains("m1"));
    }
}
