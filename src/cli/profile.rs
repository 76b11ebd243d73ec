use std::error::Error;

use super::{credential_store, resolve_settings, ProfileCommand, SessionArgs};
use crate::core::config::Config;
use crate::core::profile::{Profile, ProfileManager};
use crate::core::settings::ChatSettings;

fn lookup<'a>(manager: &'a ProfileManager, wanted: &str) -> Result<&'a Profile, Box<dyn Error>> {
    manager
        .find(wanted)
        .ok_or_else(|| format!("No profile matches '{wanted}'. Use the id when names repeat.").into())
}

pub fn run_profile(args: &SessionArgs, action: ProfileCommand) -> Result<(), Box<dyn Error>> {
    let config = Config::load()?;
    let mut manager = ProfileManager::load(&config);

    match action {
        ProfileCommand::Save { name } => {
            let store = credential_store(args, &config)?;
            let settings = resolve_settings(args, &config, store.as_ref())?;
            let profile = manager.save(&name.join(" "), &settings)?;
            println!("Saved {} ({})", ProfileManager::describe(profile), profile.id);
            manager.persist()?;
        }
        ProfileCommand::List => {
            if manager.list().is_empty() {
                println!("No profiles saved. Use `parley profile save <name>`.");
            }
            for profile in manager.list() {
                println!("{}  {}", profile.id, ProfileManager::describe(profile));
            }
        }
        ProfileCommand::Apply { profile } => {
            let id = lookup(&manager, &profile)?.id.clone();
            let mut settings = ChatSettings::default();
            manager.apply(&id, &mut settings)?;
            let summary = manager.get(&id).map(ProfileManager::describe).unwrap_or_default();
            Config::mutate(move |config| {
                config.adopt_settings(settings);
                Ok(())
            })?;
            println!("Applied {summary}");
        }
        ProfileCommand::Delete { profile } => {
            let id = lookup(&manager, &profile)?.id.clone();
            let removed = manager.delete(&id)?;
            manager.persist()?;
            println!("Deleted {}", ProfileManager::describe(&removed));
        }
    }
    Ok(())
}
