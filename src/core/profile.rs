//! Named snapshots of provider, model, system prompt and parameters.

use crate::core::builtin_providers::{display_model, display_provider};
use crate::core::config::Config;
use crate::core::settings::{ChatSettings, ModelParameters};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    pub provider_id: String,
    pub model_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub parameters: ModelParameters,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileError {
    EmptyName,
    NotFound(String),
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileError::EmptyName => write!(f, "Profile name cannot be empty"),
            ProfileError::NotFound(key) => write!(f, "Profile '{key}' not found"),
        }
    }
}

impl Error for ProfileError {}

/// Profiles in save order. Names are not unique; ids are.
#[derive(Debug, Clone, Default)]
pub struct ProfileManager {
    profiles: Vec<Profile>,
}

impl ProfileManager {
    pub fn load(config: &Config) -> Self {
        Self {
            profiles: config.profiles.clone(),
        }
    }

    pub fn list(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|profile| profile.id == id)
    }

    /// Resolve an id, or a name when exactly one profile carries it.
    pub fn find(&self, id_or_name: &str) -> Option<&Profile> {
        if let Some(profile) = self.get(id_or_name) {
            return Some(profile);
        }
        let mut by_name = self
            .profiles
            .iter()
            .filter(|profile| profile.name.eq_ignore_ascii_case(id_or_name.trim()));
        match (by_name.next(), by_name.next()) {
            (Some(profile), None) => Some(profile),
            _ => None,
        }
    }

    /// Snapshot `settings` under `name`. Saving an existing name again creates
    /// a second profile with its own id.
    pub fn save(&mut self, name: &str, settings: &ChatSettings) -> Result<&Profile, ProfileError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ProfileError::EmptyName);
        }
        let profile = Profile {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            provider_id: settings.provider_id.clone(),
            model_id: settings.model_id.clone(),
            system_prompt: settings.system_prompt.clone(),
            parameters: settings.parameters.clone(),
            created_at: Utc::now(),
        };
        debug!(id = %profile.id, name = %profile.name, "Saved profile");
        self.profiles.push(profile);
        Ok(&self.profiles[self.profiles.len() - 1])
    }

    /// Copy a profile's fields into `settings`.
    pub fn apply(&self, id: &str, settings: &mut ChatSettings) -> Result<(), ProfileError> {
        let profile = self
            .get(id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;
        settings.provider_id = profile.provider_id.clone();
        settings.model_id = profile.model_id.clone();
        settings.system_prompt = profile.system_prompt.clone();
        settings.parameters = profile.parameters.clone();
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<Profile, ProfileError> {
        let index = self
            .profiles
            .iter()
            .position(|profile| profile.id == id)
            .ok_or_else(|| ProfileError::NotFound(id.to_string()))?;
        Ok(self.profiles.remove(index))
    }

    /// One-line summary. Providers or models missing from the catalog show
    /// their raw ids.
    pub fn describe(profile: &Profile) -> String {
        format!(
            "{}: {} / {}",
            profile.name,
            display_provider(&profile.provider_id),
            display_model(&profile.provider_id, &profile.model_id)
        )
    }

    /// Write the current list back to the config file.
    pub fn persist(&self) -> Result<(), Box<dyn Error>> {
        let profiles = self.profiles.clone();
        Config::mutate(move |config| {
            config.profiles = profiles;
            Ok(())
        })
    }
}
