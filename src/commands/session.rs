// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Session management commands

use super::MESSAGES_PAGE_SIZE;
use crate::agent::{AgentService, SessionInfo};
use crate::bridge::{SessionKey, SessionResolver};
use crate::error::{BridgeError, Result};
use crate::utils::{format_timestamp_ms, truncate_chars};

const MESSAGE_PREVIEW_CHARS: usize = 100;

fn title_or_untitled(session: &SessionInfo) -> &str {
    if session.title.is_empty() {
        "untitled"
    } else {
        &session.title
    }
}

pub async fn list(agent: &dyn AgentService) -> Result<String> {
    let sessions = agent.list_sessions().await?;
    if sessions.is_empty() {
        return Ok("No sessions".to_string());
    }

    let lines: Vec<String> = sessions
        .iter()
        .map(|session| match session.model.as_deref() {
            Some(model) => format!("{}: {} ({})", session.id, title_or_untitled(session), model),
            None => format!("{}: {}", session.id, title_or_untitled(session)),
        })
        .collect();
    Ok(format!("📋 Sessions:\n{}", lines.join("\n")))
}

/// Create a fresh session for `key` and switch to it.
pub async fn create(resolver: &SessionResolver, key: &SessionKey, directory: &str) -> Result<String> {
    let session = resolver.create_fresh(key).await?;
    Ok(format!(
        "✅ Created session: {}\n📝 Title: {}\n📂 Directory: {}",
        session.id, session.title, directory
    ))
}

/// Switch `key` to an existing session.
pub async fn switch(
    agent: &dyn AgentService,
    resolver: &SessionResolver,
    key: &SessionKey,
    session_id: &str,
) -> Result<String> {
    let sessions = agent.list_sessions().await?;
    let Some(session) = sessions.into_iter().find(|s| s.id == session_id) else {
        return Err(BridgeError::Session(format!(
            "session {session_id} does not exist"
        )));
    };

    resolver.bind(key, session.id.clone());
    tracing::info!(key = %key, session_id, "switched session");
    Ok(format!(
        "✅ Switched to session: {}\n📝 Title: {}",
        session.id,
        title_or_untitled(&session)
    ))
}

/// Describe the session `key` currently talks to, creating one if needed.
pub async fn info(resolver: &SessionResolver, key: &SessionKey) -> Result<String> {
    let session = resolver.resolve(key).await?;
    let created = session
        .created_at()
        .map(|dt| format_timestamp_ms(dt.timestamp_millis()))
        .unwrap_or_else(|| "unknown".to_string());

    Ok(format!(
        "📌 Current session:\nID: {}\nTitle: {}\nModel: {}\nCreated: {}",
        session.id,
        title_or_untitled(&session),
        session.model.as_deref().unwrap_or("default"),
        created
    ))
}

/// Delete a session and drop every binding to it.
pub async fn delete(
    agent: &dyn AgentService,
    resolver: &SessionResolver,
    session_id: &str,
) -> Result<String> {
    agent.delete_session(session_id).await?;
    resolver.forget_session(session_id);
    tracing::info!(session_id, "deleted session");
    Ok(format!("✅ Deleted session: {session_id}"))
}

/// Page through the user messages of the current session.
pub async fn messages(
    agent: &dyn AgentService,
    resolver: &SessionResolver,
    key: &SessionKey,
    page: Option<usize>,
) -> Result<String> {
    let session = resolver.resolve(key).await?;
    let transcript = agent.messages(&session.id).await?;
    let user_messages: Vec<_> = transcript
        .iter()
        .filter(|message| message.info.role == "user")
        .collect();

    if user_messages.is_empty() {
        return Ok("No user messages".to_string());
    }

    let total_pages = user_messages.len().div_ceil(MESSAGES_PAGE_SIZE);
    let page = page.unwrap_or(1);
    if page < 1 || page > total_pages {
        return Ok(format!("❌ Page out of range (1-{total_pages})"));
    }

    let start = (page - 1) * MESSAGES_PAGE_SIZE;
    let end = (start + MESSAGES_PAGE_SIZE).min(user_messages.len());
    let lines: Vec<String> = user_messages[start..end]
        .iter()
        .rev()
        .enumerate()
        .map(|(idx, message)| {
            let text = message.text();
            let preview = if text.is_empty() {
                "[no text]".to_string()
            } else {
                truncate_chars(&text, MESSAGE_PREVIEW_CHARS)
            };
            format!("{}. {}", start + idx + 1, preview)
        })
        .collect();

    let mut out = format!(
        "📜 Message history (page {page}/{total_pages}):\n\n{}",
        lines.join("\n")
    );
    if page < total_pages {
        out.push_str(&format!(
            "\n\n💡 Use \"session messages {}\" for the next page",
            page + 1
        ));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{MessageWithParts, MockAgentService};
    use serde_json::json;
    use std::sync::Arc;

    fn key() -> SessionKey {
        SessionKey::new("console", "operator", "default")
    }

    fn user_message(id: &str, text: &str) -> MessageWithParts {
        serde_json::from_value(json!({
            "info": {"id": id, "role": "user"},
            "parts": [{"type": "text", "text": text}]
        }))
        .unwrap()
    }

    fn assistant_message(id: &str) -> MessageWithParts {
        serde_json::from_value(json!({
            "info": {"id": id, "role": "assistant"},
            "parts": [{"type": "text", "text": "reply"}]
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_list() {
        let mut with_model = SessionInfo::new("ses_b", "");
        with_model.model = Some("anthropic/claude".to_string());
        let agent = MockAgentService::new()
            .with_session(SessionInfo::new("ses_a", "First"))
            .with_session(with_model);

        let text = list(&agent).await.unwrap();
        assert_eq!(
            text,
            "📋 Sessions:\nses_a: First\nses_b: untitled (anthropic/claude)"
        );
        assert_eq!(list(&MockAgentService::new()).await.unwrap(), "No sessions");
    }

    #[tokio::test]
    async fn test_create_binds_new_session() {
        let agent = Arc::new(MockAgentService::new());
        let resolver = SessionResolver::new(agent.clone(), None);
        let text = create(&resolver, &key(), "default").await.unwrap();
        let bound = resolver.bound(&key()).unwrap();
        assert!(text.starts_with(&format!("✅ Created session: {bound}")));
        assert!(text.ends_with("📂 Directory: default"));
    }

    #[tokio::test]
    async fn test_switch_unknown_session_errors() {
        let agent = Arc::new(MockAgentService::new());
        let resolver = SessionResolver::new(agent.clone(), None);
        let err = switch(agent.as_ref(), &resolver, &key(), "ses_missing")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("ses_missing"));
        assert!(resolver.bound(&key()).is_none());
    }

    #[tokio::test]
    async fn test_switch_binds() {
        let agent = Arc::new(MockAgentService::new().with_session(SessionInfo::new("ses_x", "X")));
        let resolver = SessionResolver::new(agent.clone(), None);
        let text = switch(agent.as_ref(), &resolver, &key(), "ses_x").await.unwrap();
        assert_eq!(text, "✅ Switched to session: ses_x\n📝 Title: X");
        assert_eq!(resolver.bound(&key()).as_deref(), Some("ses_x"));
    }

    #[tokio::test]
    async fn test_info_without_created_time() {
        let agent = Arc::new(MockAgentService::new().with_session(SessionInfo::new("ses_x", "X")));
        let resolver = SessionResolver::new(agent, None);
        resolver.bind(&key(), "ses_x");
        let text = info(&resolver, &key()).await.unwrap();
        assert_eq!(
            text,
            "📌 Current session:\nID: ses_x\nTitle: X\nModel: default\nCreated: unknown"
        );
    }

    #[tokio::test]
    async fn test_delete_forgets_binding() {
        let agent = Arc::new(MockAgentService::new().with_session(SessionInfo::new("ses_x", "X")));
        let resolver = SessionResolver::new(agent.clone(), None);
        resolver.bind(&key(), "ses_x");

        let text = delete(agent.as_ref(), &resolver, "ses_x").await.unwrap();
        assert_eq!(text, "✅ Deleted session: ses_x");
        assert!(resolver.bound(&key()).is_none());
        assert!(delete(agent.as_ref(), &resolver, "ses_x").await.is_err());
    }

    #[tokio::test]
    async fn test_messages_pagination() {
        let mut transcript = Vec::new();
        for i in 1..=7 {
            transcript.push(user_message(&format!("u{i}"), &format!("question {i}")));
            transcript.push(assistant_message(&format!("a{i}")));
        }
        let agent = Arc::new(
            MockAgentService::new()
                .with_session(SessionInfo::new("ses_x", "X"))
                .with_transcript("ses_x", transcript),
        );
        let resolver = SessionResolver::new(agent.clone(), None);
        resolver.bind(&key(), "ses_x");

        let first = messages(agent.as_ref(), &resolver, &key(), None).await.unwrap();
        assert!(first.starts_with("📜 Message history (page 1/2):"));
        assert!(first.contains("1. question 5"));
        assert!(first.contains("5. question 1"));
        assert!(first.contains("session messages 2"));

        let second = messages(agent.as_ref(), &resolver, &key(), Some(2)).await.unwrap();
        assert!(second.contains("6. question 7"));
        assert!(second.contains("7. question 6"));
        assert!(!second.contains("next page"));

        let out_of_range = messages(agent.as_ref(), &resolver, &key(), Some(3)).await.unwrap();
        assert_eq!(out_of_range, "❌ Page out of range (1-2)");
        let zero = messages(agent.as_ref(), &resolver, &key(), Some(0)).await.unwrap();
        assert_eq!(zero, "❌ Page out of range (1-2)");
    }

    #[tokio::test]
    async fn test_messages_truncates_long_text() {
        let long = "x".repeat(150);
        let agent = Arc::new(
            MockAgentService::new()
                .with_session(SessionInfo::new("ses_x", "X"))
                .with_transcript("ses_x", vec![user_message("u1", &long)]),
        );
        let resolver = SessionResolver::new(agent.clone(), None);
        resolver.bind(&key(), "ses_x");
        let text = messages(agent.as_ref(), &resolver, &key(), None).await.unwrap();
        assert!(text.contains(&format!("1. {}...", "x".repeat(100))));
    }
}
