//! Storing and removing provider API keys.

use std::error::Error;
use std::io::{self, BufRead, Write};

use super::{credential_store, SessionArgs};
use crate::core::builtin_providers::{self, Provider};
use crate::core::config::Config;

fn known_provider(provider_id: &str) -> Result<&'static Provider, Box<dyn Error>> {
    builtin_providers::get(provider_id).ok_or_else(|| {
        format!("Unknown provider '{provider_id}'. Run `parley providers` to list them.").into()
    })
}

pub fn run_auth(args: &SessionArgs, provider_id: &str) -> Result<(), Box<dyn Error>> {
    if args.env_only {
        return Err("--env-only reads keys from the environment; there is nothing to store.".into());
    }
    let provider = known_provider(provider_id)?;
    if !provider.requires_key {
        println!("{} does not need an API key.", provider.display_name);
        return Ok(());
    }

    print!("API key for {}: ", provider.display_name);
    io::stdout().flush()?;
    let mut key = String::new();
    io::stdin().lock().read_line(&mut key)?;
    let key = key.trim();
    if key.is_empty() {
        return Err("No key entered; nothing was stored.".into());
    }

    let config = Config::load()?;
    credential_store(args, &config)?.save(&provider.id, key)?;
    println!("Stored the key for {}.", provider.display_name);
    Ok(())
}

pub fn run_deauth(args: &SessionArgs, provider_id: &str) -> Result<(), Box<dyn Error>> {
    let provider = known_provider(provider_id)?;
    let config = Config::load()?;
    credential_store(args, &config)?.clear(&provider.id)?;
    println!("Removed the stored key for {}.", provider.display_name);
    if let Some(var) = &provider.api_key_env {
        if std::env::var(var).is_ok() {
            println!("Note: {var} is still set in the environment.");
        }
    }
    Ok(())
}
