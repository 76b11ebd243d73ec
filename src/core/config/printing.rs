use crate::core::builtin_providers::{display_model, display_provider};
use crate::core::config::data::{path_display, Config};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.default_provider {
            Some(provider) => println!("  default-provider: {}", display_provider(provider)),
            None => println!("  default-provider: (unset)"),
        }
        if self.default_models.is_empty() {
            println!("  default-models: (none set)");
        } else {
            println!("  default-models:");
            for (provider, model) in &self.default_models {
                println!("    {provider}: {}", display_model(provider, model));
            }
        }
        match self.system_prompt.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(prompt) => println!("  system-prompt: {prompt}"),
            None => println!("  system-prompt: (unset)"),
        }
        if let Some(temperature) = self.parameters.temperature {
            println!("  temperature: {temperature}");
        }
        if let Some(top_p) = self.parameters.top_p {
            println!("  top-p: {top_p}");
        }
        if let Some(max_tokens) = self.parameters.max_tokens {
            println!("  max-tokens: {max_tokens}");
        }
        println!("  max-tool-hops: {}", self.max_tool_hops());
        println!(
            "  auto-run-tools: {}",
            if self.auto_run_tools() { "on" } else { "off" }
        );
        println!(
            "  keyring: {}",
            if self.use_keyring() { "on" } else { "off" }
        );
        match &self.log_file {
            Some(path) => println!("  log-file: {}", path_display(path)),
            None => println!("  log-file: (unset)"),
        }
        println!("  profiles: {}", self.profiles.len());
    }
}
