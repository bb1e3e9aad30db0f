// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Service health, agents, and streaming status

use crate::agent::AgentService;
use crate::bridge::delivery::resolve_mode;
use crate::bridge::{StreamMode, StreamSettings};
use crate::config::StreamModeSetting;
use crate::error::Result;
use crate::gateway::MessagingGateway;

pub async fn health(agent: &dyn AgentService) -> Result<String> {
    let health = agent.health().await?;
    Ok(format!(
        "🏥 Agent service status:\nHealthy: {}\nVersion: {}",
        if health.healthy { "✅" } else { "❌" },
        health.version.as_deref().unwrap_or("unknown")
    ))
}

pub async fn agents(agent: &dyn AgentService) -> Result<String> {
    let agents = agent.agents().await?;
    if agents.is_empty() {
        return Ok("No agents available".to_string());
    }

    let entries: Vec<String> = agents
        .iter()
        .map(|info| match info.description.as_deref() {
            Some(description) if !description.is_empty() => {
                format!("🤖 {}\n   {}", info.display_name(), description)
            }
            _ => format!("🤖 {}", info.display_name()),
        })
        .collect();
    Ok(format!("📋 Agents:\n\n{}", entries.join("\n\n")))
}

fn mode_label(mode: StreamMode) -> &'static str {
    match mode {
        StreamMode::Native => "⚡ native (edit in place)",
        StreamMode::Segmented => "📝 segmented",
    }
}

/// Streaming configuration and the strategy it resolves to on `gateway`.
pub fn stream_status(settings: &StreamSettings, gateway: &dyn MessagingGateway) -> String {
    let mut lines = vec![
        "🌊 Streaming status:".to_string(),
        format!(
            "Enabled: {}",
            if settings.enabled { "✅ on" } else { "❌ off" }
        ),
        format!("Configured mode: {}", settings.mode.as_str()),
    ];

    if settings.enabled {
        let resolved = resolve_mode(settings.mode, gateway);
        match settings.mode {
            StreamModeSetting::Auto => {
                lines.push(format!("Resolved: {}", mode_label(resolved)));
                lines.push(if gateway.supports_edit() {
                    format!("({} supports editing)", gateway.name())
                } else {
                    format!("({} cannot edit, falling back)", gateway.name())
                });
            }
            StreamModeSetting::Native => {
                lines.push(format!("Strategy: {} (forced)", mode_label(resolved)));
                lines.push("(falls back to segmented if an edit fails)".to_string());
            }
            StreamModeSetting::Segment => {
                lines.push(format!("Strategy: {} (forced)", mode_label(resolved)));
            }
        }
        lines.push(format!("Interval: {}ms", settings.interval.as_millis()));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::{AgentInfo, MockAgentService};
    use crate::gateway::MockGateway;
    use std::time::Duration;

    #[tokio::test]
    async fn test_health() {
        let text = health(&MockAgentService::new()).await.unwrap();
        assert_eq!(text, "🏥 Agent service status:\nHealthy: ✅\nVersion: mock");
    }

    #[tokio::test]
    async fn test_agents() {
        let agent = MockAgentService::new().with_agents(vec![
            AgentInfo {
                id: Some("build".to_string()),
                name: Some("Build".to_string()),
                description: Some("Writes code".to_string()),
            },
            AgentInfo {
                id: Some("plan".to_string()),
                name: None,
                description: None,
            },
        ]);
        let text = agents(&agent).await.unwrap();
        assert_eq!(text, "📋 Agents:\n\n🤖 Build\n   Writes code\n\n🤖 plan");
        assert_eq!(
            agents(&MockAgentService::new()).await.unwrap(),
            "No agents available"
        );
    }

    #[test]
    fn test_stream_status_auto() {
        let settings = StreamSettings {
            enabled: true,
            mode: StreamModeSetting::Auto,
            interval: Duration::from_millis(500),
        };
        let editable = stream_status(&settings, &MockGateway::editable());
        assert!(editable.contains("Resolved: ⚡ native"));
        assert!(editable.contains("Interval: 500ms"));

        let send_only = stream_status(&settings, &MockGateway::new());
        assert!(send_only.contains("Resolved: 📝 segmented"));
        assert!(send_only.contains("cannot edit"));
    }

    #[test]
    fn test_stream_status_disabled() {
        let settings = StreamSettings {
            enabled: false,
            ..StreamSettings::default()
        };
        let text = stream_status(&settings, &MockGateway::new());
        assert!(text.contains("Enabled: ❌ off"));
        assert!(!text.contains("Interval"));
    }
}
