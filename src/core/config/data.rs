use crate::core::conversation::StarredSet;
use crate::core::profile::Profile;
use crate::core::settings::ModelParameters;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_MAX_TOOL_HOPS: usize = 5;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq)]
pub struct Config {
    pub default_provider: Option<String>,
    /// Provider id (lowercase) to model id.
    #[serde(default)]
    pub default_models: BTreeMap<String, String>,
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub parameters: ModelParameters,
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub starred: StarredSet,
    /// Upper bound on automatic tool follow-up turns.
    pub max_tool_hops: Option<usize>,
    /// Run tools without a human policy as soon as the reply finishes.
    pub auto_run_tools: Option<bool>,
    /// Append finished messages to this transcript file.
    pub log_file: Option<PathBuf>,
    /// Store API keys in the OS keyring rather than `credentials.toml`.
    pub use_keyring: Option<bool>,
}

impl Config {
    pub fn max_tool_hops(&self) -> usize {
        self.max_tool_hops.unwrap_or(DEFAULT_MAX_TOOL_HOPS)
    }

    pub fn auto_run_tools(&self) -> bool {
        self.auto_run_tools.unwrap_or(true)
    }

    pub fn use_keyring(&self) -> bool {
        self.use_keyring.unwrap_or(true)
    }
}

/// Display a path with the home directory shortened to `~` on Unix.
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
