use crate::core::config::Config;
use serde::{Deserialize, Serialize};

/// Sampling parameters forwarded to the provider. Unset values are omitted
/// from the request so the provider's own defaults apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ModelParameters {
    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.top_p.is_none() && self.max_tokens.is_none()
    }
}

/// The provider, model and prompt a turn is sent with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSettings {
    pub provider_id: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub parameters: ModelParameters,
}

impl ChatSettings {
    pub fn new(provider_id: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            provider_id: provider_id.into(),
            model_id: model_id.into(),
            system_prompt: None,
            parameters: ModelParameters::default(),
        }
    }

    /// Settings derived from configuration defaults. Explicit provider or
    /// model arguments win over the configured ones; a provider with no model
    /// falls back to its first catalog model.
    pub fn from_config(
        config: &Config,
        provider: Option<&str>,
        model: Option<&str>,
    ) -> Option<Self> {
        let provider_id = provider
            .map(str::to_string)
            .or_else(|| config.default_provider.clone())?
            .to_lowercase();
        let model_id = model
            .map(str::to_string)
            .or_else(|| config.get_default_model(&provider_id).cloned())
            .or_else(|| {
                crate::core::builtin_providers::get(&provider_id)
                    .and_then(|p| p.models.first())
                    .map(|m| m.id.clone())
            })?;

        Some(Self {
            provider_id,
            model_id,
            system_prompt: config
                .system_prompt
                .as_ref()
                .filter(|prompt| !prompt.trim().is_empty())
                .cloned(),
            parameters: config.parameters.clone(),
        })
    }

    /// System prompt to send, or `None` when blank.
    pub fn effective_system_prompt(&self) -> Option<&str> {
        self.system_prompt
            .as_deref()
            .map(str::trim)
            .filter(|prompt| !prompt.is_empty())
    }
}
