//! Model listing from the built-in catalog or the provider's endpoint.

use std::error::Error;

use chrono::{DateTime, Utc};

use super::{credential_store, resolve_settings, SessionArgs};
use crate::api::models::{fetch_models, sort_models};
use crate::api::ModelInfo;
use crate::core::builtin_providers::{self, Exclusion, Model};
use crate::core::config::Config;
use crate::core::credentials::resolve_api_key;

pub async fn list_models(args: &SessionArgs, remote: bool) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let store = credential_store(args, &config)?;
    let settings = resolve_settings(args, &config, store.as_ref())?;
    let provider = builtin_providers::get(&settings.provider_id)
        .ok_or_else(|| format!("Unknown provider '{}'", settings.provider_id))?;

    println!("Models for {}", provider.display_name);
    println!();
    if let Some(default_model) = config.get_default_model(&provider.id) {
        println!("Default model for this provider: {default_model} (from config)");
        println!();
    }

    if !remote {
        for model in &provider.models {
            println!("  - {}", describe_catalog_model(model));
        }
        return Ok(());
    }

    let api_key = resolve_api_key(store.as_ref(), provider)?;
    let client = reqwest::Client::new();
    let mut models = fetch_models(&client, provider, api_key.as_deref()).await?.data;
    if models.is_empty() {
        println!("No models found for this provider.");
        return Ok(());
    }

    println!("Found {} models (sorted newest first):", models.len());
    println!();
    sort_models(&mut models);
    for model in &models {
        for line in describe_remote_model(model) {
            println!("{line}");
        }
        println!();
    }
    Ok(())
}

pub(crate) fn describe_catalog_model(model: &Model) -> String {
    let mut line = if model.display_name.is_empty() || model.display_name == model.id {
        model.id.clone()
    } else {
        format!("{} ({})", model.id, model.display_name)
    };
    let mut notes: Vec<String> = model.capabilities.iter().map(ToString::to_string).collect();
    if let Some(window) = model.context_window {
        notes.push(format!("{}k context", window / 1000));
    }
    for exclusion in &model.exclusions {
        notes.push(
            match exclusion {
                Exclusion::NoSystemPrompt => "no system prompt",
                Exclusion::NoStreaming => "no streaming",
            }
            .to_string(),
        );
    }
    if !notes.is_empty() {
        line.push_str(&format!(" [{}]", notes.join(", ")));
    }
    line
}

/// Unix timestamps above this are taken to be milliseconds.
const MILLIS_THRESHOLD: u64 = 10_000_000_000;

pub(crate) fn describe_remote_model(model: &ModelInfo) -> Vec<String> {
    let mut lines = vec![format!("  - {}", model.id)];
    if let Some(name) = model
        .display_name
        .as_deref()
        .filter(|name| !name.is_empty() && *name != model.id)
    {
        lines.push(format!("    Name: {name}"));
    }
    if let Some(owner) = model
        .owned_by
        .as_deref()
        .filter(|owner| !owner.is_empty() && *owner != "system")
    {
        lines.push(format!("    Owner: {owner}"));
    }
    match (model.created, model.created_at.as_deref()) {
        (Some(created), _) if created > 0 => {
            let secs = if created > MILLIS_THRESHOLD { created / 1000 } else { created };
            if let Some(dt) = i64::try_from(secs).ok().and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)) {
                lines.push(format!("    Created: {}", dt.format("%Y-%m-%d %H:%M:%S UTC")));
            }
        }
        (None, Some(created_at)) if !created_at.is_empty() => {
            lines.push(format!("    Created: {created_at}"));
        }
        _ => {}
    }
    lines
}
