use crate::core::config::data::Config;
use crate::core::settings::ChatSettings;

impl Config {
    /// Model remembered for `provider`. Keys are matched case-insensitively so
    /// hand-edited files with mixed-case provider ids still resolve.
    pub fn get_default_model(&self, provider: &str) -> Option<&String> {
        let provider = provider.trim();
        self.default_models
            .get(&provider.to_lowercase())
            .or_else(|| {
                self.default_models
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(provider))
                    .map(|(_, model)| model)
            })
    }

    pub fn set_default_model(&mut self, provider: &str, model: impl Into<String>) {
        self.unset_default_model(provider);
        self.default_models
            .insert(provider.trim().to_lowercase(), model.into());
    }

    pub fn unset_default_model(&mut self, provider: &str) {
        let provider = provider.trim();
        self.default_models
            .retain(|key, _| !key.eq_ignore_ascii_case(provider));
    }

    /// Make `settings` what a bare `parley` invocation starts from.
    pub fn adopt_settings(&mut self, settings: ChatSettings) {
        self.set_default_model(&settings.provider_id, settings.model_id);
        self.default_provider = Some(settings.provider_id);
        self.system_prompt = settings.system_prompt;
        self.parameters = settings.parameters;
    }
}
