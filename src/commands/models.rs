// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Model listing and selection

use crate::agent::{AgentService, ProviderInfo};
use crate::config::{ModelRef, Settings};
use crate::error::Result;

/// List provider models, optionally filtered by a case-insensitive keyword
/// matched against provider and model ids and names.
pub async fn list(agent: &dyn AgentService, keyword: Option<&str>) -> Result<String> {
    let providers = agent.providers().await?;
    let keyword = keyword.map(str::trim).filter(|k| !k.is_empty());
    let needle = keyword.map(str::to_lowercase);

    let sections: Vec<String> = providers
        .iter()
        .filter_map(|provider| render_provider(provider, needle.as_deref()))
        .collect();

    if sections.is_empty() {
        return Ok(match keyword {
            Some(keyword) => format!("❌ No models matching \"{keyword}\""),
            None => "No models available".to_string(),
        });
    }
    Ok(sections.join("\n\n"))
}

fn render_provider(provider: &ProviderInfo, needle: Option<&str>) -> Option<String> {
    let provider_match = needle.is_some_and(|needle| {
        provider.id.to_lowercase().contains(needle)
            || provider.display_name().to_lowercase().contains(needle)
    });

    let lines: Vec<String> = provider
        .models()
        .into_iter()
        .filter(|model| match needle {
            None => true,
            Some(_) if provider_match => true,
            Some(needle) => {
                model.id.to_lowercase().contains(needle)
                    || model
                        .name
                        .as_deref()
                        .is_some_and(|name| name.to_lowercase().contains(needle))
            }
        })
        .map(|model| {
            format!(
                "  - {}/{}: {}",
                provider.id,
                model.id,
                model.name.as_deref().unwrap_or(&model.id)
            )
        })
        .collect();

    if lines.is_empty() {
        return None;
    }
    Some(format!("📦 [{}]\n{}", provider.display_name(), lines.join("\n")))
}

/// Validate `model` and store it in `settings`. Unknown models are accepted
/// with a warning.
pub async fn set(agent: &dyn AgentService, settings: &mut Settings, model: &str) -> Result<String> {
    let model_ref = ModelRef::parse(model)?;
    let model = format!("{}/{}", model_ref.provider_id, model_ref.model_id);

    let providers = agent.providers().await?;
    let known = providers.iter().any(|provider| {
        provider.id == model_ref.provider_id
            && provider
                .models()
                .iter()
                .any(|m| m.id == model_ref.model_id)
    });

    settings.model = Some(model.clone());
    tracing::info!(model = %model, known, "default model set");

    let confirmation = format!("✅ Default model set to: {model}");
    if known {
        Ok(confirmation)
    } else {
        Ok(format!(
            "⚠️ Model \"{model}\" is not in the provider list, setting it anyway\n{confirmation}"
        ))
    }
}
