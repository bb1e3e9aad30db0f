// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

use crate::error::{BridgeError, Result};

use super::Settings;

/// A model reference split into its provider and model parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRef {
    pub provider_id: String,
    pub model_id: String,
}

impl ModelRef {
    /// Parse `provider/model`.
    pub fn parse(model: &str) -> Result<Self> {
        match model.trim().split_once('/') {
            Some((provider, model_id))
                if !provider.is_empty() && !model_id.is_empty() && !model_id.contains('/') =>
            {
                Ok(Self {
                    provider_id: provider.to_string(),
                    model_id: model_id.to_string(),
                })
            }
            _ => Err(BridgeError::Config(format!(
                "model must be in provider/model form (e.g. anthropic/claude-3-5-sonnet), got '{}'",
                model
            ))),
        }
    }
}

impl Settings {
    /// Get the agent service address, checking env var first.
    pub fn effective_base_url(&self) -> String {
        // Priority: env var > config file.
        std::env::var("CHATBRIDGE_BASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| self.base_url.clone())
            .trim_end_matches('/')
            .to_string()
    }

    /// Parsed model override, if one is configured.
    pub fn model_ref(&self) -> Result<Option<ModelRef>> {
        self.model.as_deref().map(ModelRef::parse).transpose()
    }

    /// Reject settings that cannot drive a turn.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(BridgeError::Config("base_url must not be empty".to_string()));
        }
        if self.timeout_ms == 0 {
            return Err(BridgeError::Config("timeout_ms must be positive".to_string()));
        }
        self.model_ref()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_ref_parse() {
        let model = ModelRef::parse("anthropic/claude-3-5-sonnet").unwrap();
        assert_eq!(model.provider_id, "anthropic");
        assert_eq!(model.model_id, "claude-3-5-sonnet");
    }

    #[test]
    fn test_model_ref_rejects_bad_shapes() {
        assert!(ModelRef::parse("claude").is_err());
        assert!(ModelRef::parse("/claude").is_err());
        assert!(ModelRef::parse("anthropic/").is_err());
        assert!(ModelRef::parse("a/b/c").is_err());
    }

    #[test]
    fn test_validate_defaults_ok() {
        assert!(Settings::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let settings = Settings {
            timeout_ms: 0,
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_model() {
        let settings = Settings {
            model: Some("nope".to_string()),
            ..Settings::default()
        };
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("provider/model"));
    }

    #[test]
    fn test_model_ref_none_when_unset() {
        assert_eq!(Settings::default().model_ref().unwrap(), None);
    }
}
