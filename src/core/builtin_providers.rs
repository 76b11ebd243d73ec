//! Built-in provider registry
//!
//! The provider/model catalog is embedded from `builtin_providers.toml` at
//! build time and parsed once per process. Nothing mutates it afterwards;
//! callers hold references into the static catalog or copy what they need.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Capability {
    Reasoning,
    Vision,
    LongContext,
    Fast,
    ImageGeneration,
    WebSearch,
    Code,
}

impl Capability {
    pub fn as_str(self) -> &'static str {
        match self {
            Capability::Reasoning => "reasoning",
            Capability::Vision => "vision",
            Capability::LongContext => "long-context",
            Capability::Fast => "fast",
            Capability::ImageGeneration => "image-generation",
            Capability::WebSearch => "web-search",
            Capability::Code => "code",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Features a model is known not to support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Exclusion {
    NoSystemPrompt,
    NoStreaming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    /// `Authorization: Bearer <key>`
    #[default]
    Bearer,
    /// `x-api-key: <key>`
    Anthropic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Model {
    pub id: String,
    pub display_name: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
    #[serde(default)]
    pub context_window: Option<u32>,
    #[serde(default)]
    pub exclusions: Vec<Exclusion>,
}

impl Model {
    pub fn has_capability(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn supports_system_prompt(&self) -> bool {
        !self.exclusions.contains(&Exclusion::NoSystemPrompt)
    }

    pub fn supports_streaming(&self) -> bool {
        !self.exclusions.contains(&Exclusion::NoStreaming)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: String,
    pub display_name: String,
    pub base_url: String,
    #[serde(default)]
    pub requires_key: bool,
    #[serde(default)]
    pub auth_mode: AuthMode,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub models: Vec<Model>,
    #[serde(default)]
    pub supports_model_list: bool,
}

impl Provider {
    /// Find a model by ID (exact match, then case-insensitive)
    pub fn model(&self, model_id: &str) -> Option<&Model> {
        self.models
            .iter()
            .find(|m| m.id == model_id)
            .or_else(|| self.models.iter().find(|m| m.id.eq_ignore_ascii_case(model_id)))
    }

    pub fn is_anthropic_mode(&self) -> bool {
        self.auth_mode == AuthMode::Anthropic
    }
}

#[derive(Debug, Deserialize)]
struct BuiltinProvidersConfig {
    providers: Vec<Provider>,
}

static BUILTIN_PROVIDERS: LazyLock<Vec<Provider>> = LazyLock::new(|| {
    const CONFIG_CONTENT: &str = include_str!("../builtin_providers.toml");

    let config: BuiltinProvidersConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtin_providers.toml");

    config.providers
});

/// All built-in providers, in catalog order
pub fn all() -> &'static [Provider] {
    &BUILTIN_PROVIDERS
}

/// Find a built-in provider by ID (case-insensitive)
pub fn get(provider_id: &str) -> Option<&'static Provider> {
    all()
        .iter()
        .find(|p| p.id.eq_ignore_ascii_case(provider_id))
}

/// Provider display name, or the raw id when the catalog no longer has it.
pub fn display_provider(provider_id: &str) -> String {
    get(provider_id)
        .map(|p| p.display_name.clone())
        .unwrap_or_else(|| provider_id.to_string())
}

/// Model display name, or the raw model id when either side is missing.
pub fn display_model(provider_id: &str, model_id: &str) -> String {
    get(provider_id)
        .and_then(|p| p.model(model_id))
        .map(|m| m.display_name.clone())
        .unwrap_or_else(|| model_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_loads_expected_providers() {
        let ids: Vec<&str> = all().iter().map(|p| p.id.as_str()).collect();
        assert!(ids.contains(&"openai"));
        assert!(ids.contains(&"anthropic"));
        assert!(ids.contains(&"openrouter"));
        assert!(ids.contains(&"ollama"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let provider = get("OpenAI").expect("openai present");
        assert_eq!(provider.id, "openai");
        assert!(get("nonexistent").is_none());
    }

    #[test]
    fn provider_properties_are_well_formed() {
        for provider in all() {
            assert!(!provider.id.is_empty());
            assert!(!provider.display_name.is_empty());
            assert!(provider.base_url.starts_with("http"));
            assert!(!provider.models.is_empty(), "{} has no models", provider.id);
            if provider.requires_key {
                assert!(provider.api_key_env.is_some(), "{} lacks api_key_env", provider.id);
            }
        }
    }

    #[test]
    fn anthropic_uses_its_own_auth_mode() {
        let anthropic = get("anthropic").unwrap();
        assert!(anthropic.is_anthropic_mode());
        assert_eq!(
            anthropic.headers.get("anthropic-version").map(String::as_str),
            Some("2023-06-01")
        );
        assert!(!get("openai").unwrap().is_anthropic_mode());
    }

    #[test]
    fn exclusions_are_reflected_in_model_support() {
        let model = get("openai").unwrap().model("o1-mini").unwrap();
        assert!(!model.supports_system_prompt());
        assert!(!model.supports_streaming());
        assert!(model.has_capability(Capability::Reasoning));

        let model = get("openai").unwrap().model("gpt-4o").unwrap();
        assert!(model.supports_system_prompt());
        assert!(model.supports_streaming());
    }

    #[test]
    fn display_falls_back_to_raw_ids() {
        assert_eq!(display_provider("openai"), "OpenAI");
        assert_eq!(display_provider("retired-co"), "retired-co");
        assert_eq!(display_model("openai", "gpt-4o"), "GPT-4o");
        assert_eq!(display_model("openai", "gpt-2"), "gpt-2");
        assert_eq!(display_model("retired-co", "m1"), "m1");
    }
}
