use super::*;
use crate::core::credentials::{CredentialError, MemoryCredentialStore};
use crate::core::pipeline::PipelineError;
use crate::core::profile::Profile;
use crate::core::settings::ModelParameters;
use chrono::Utc;

mod test_helpers {
    use super::*;

    pub(super) fn parse_args(argv: &[&str]) -> Args {
        Args::try_parse_from(argv)
            .unwrap_or_else(|err| panic!("argv={argv:?} should parse successfully: {err}"))
    }

    pub(super) fn config_with_default() -> Config {
        let mut config = Config {
            default_provider: Some("openai".into()),
            system_prompt: Some("Be brief.".into()),
            ..Default::default()
        };
        config.set_default_model("openai", "gpt-4o-mini");
        config
    }

    pub(super) fn settings_for(argv: &[&str], config: &Config) -> Result<ChatSettings, String> {
        let args = parse_args(argv);
        resolve_settings(&args.session, config, &MemoryCredentialStore::new()).map_err(|e| e.to_string())
    }
}

use test_helpers::{config_with_default, parse_args, settings_for};

#[test]
fn bare_invocation_is_chat_with_no_overrides() {
    let args = parse_args(&["parley"]);
    assert!(args.command.is_none());
    assert!(args.session.provider.is_none());
    assert!(!args.session.no_tools);
}

#[test]
fn say_joins_trailing_words() {
    let args = parse_args(&["parley", "-p", "openai", "say", "what", "is", "-1?"]);
    match args.command {
        Some(Commands::Say { prompt }) => assert_eq!(prompt.join(" "), "what is -1?"),
        other => panic!("expected say, got {other:?}"),
    }
    assert_eq!(args.session.provider.as_deref(), Some("openai"));
}

#[test]
fn global_flags_work_after_the_subcommand() {
    let args = parse_args(&["parley", "models", "--remote", "-p", "groq", "--env-only"]);
    assert!(matches!(args.command, Some(Commands::Models { remote: true })));
    assert_eq!(args.session.provider.as_deref(), Some("groq"));
    assert!(args.session.env_only);
}

#[test]
fn attachments_repeat() {
    let args = parse_args(&["parley", "--attach", "a.md", "--attach", "b.png"]);
    assert_eq!(
        args.session.attachments,
        vec![PathBuf::from("a.md"), PathBuf::from("b.png")]
    );
}

#[test]
fn profile_save_accepts_multi_word_names() {
    let args = parse_args(&["parley", "profile", "save", "Fast", "GPT"]);
    match args.command {
        Some(Commands::Profile {
            action: ProfileCommand::Save { name },
        }) => assert_eq!(name.join(" "), "Fast GPT"),
        other => panic!("expected profile save, got {other:?}"),
    }
}

#[test]
fn say_requires_a_prompt() {
    assert!(Args::try_parse_from(["parley", "say"]).is_err());
}

#[test]
fn settings_come_from_config_defaults() {
    let settings = settings_for(&["parley"], &config_with_default()).unwrap();
    assert_eq!(settings.provider_id, "openai");
    assert_eq!(settings.model_id, "gpt-4o-mini");
    assert_eq!(settings.system_prompt.as_deref(), Some("Be brief."));
}

#[test]
fn explicit_model_overrides_config() {
    let settings = settings_for(&["parley", "-m", "gpt-4o"], &config_with_default()).unwrap();
    assert_eq!(settings.provider_id, "openai");
    assert_eq!(settings.model_id, "gpt-4o");
}

#[test]
fn switching_provider_uses_its_first_catalog_model() {
    let settings = settings_for(&["parley", "-p", "Anthropic"], &config_with_default()).unwrap();
    assert_eq!(settings.provider_id, "anthropic");
    assert_eq!(settings.model_id, "claude-3-5-sonnet-latest");
}

#[test]
fn unknown_provider_is_rejected() {
    let err = settings_for(&["parley", "-p", "nope"], &config_with_default()).unwrap_err();
    assert!(err.contains("Unknown provider 'nope'"));
}

#[test]
fn system_flag_wins() {
    let settings = settings_for(&["parley", "--system", "Talk like a pirate."], &config_with_default()).unwrap();
    assert_eq!(settings.system_prompt.as_deref(), Some("Talk like a pirate."));
}

#[test]
fn profile_applies_before_explicit_flags() {
    let mut config = config_with_default();
    config.profiles.push(Profile {
        id: "p-1".into(),
        name: "Local".into(),
        provider_id: "ollama".into(),
        model_id: "qwq".into(),
        system_prompt: Some("Think aloud.".into()),
        parameters: ModelParameters {
            temperature: Some(0.2),
            ..Default::default()
        },
        created_at: Utc::now(),
    });

    let settings = settings_for(&["parley", "--profile", "local"], &config).unwrap();
    assert_eq!((settings.provider_id.as_str(), settings.model_id.as_str()), ("ollama", "qwq"));
    assert_eq!(settings.parameters.temperature, Some(0.2));

    let settings = settings_for(&["parley", "--profile", "p-1", "-m", "llama3.2"], &config).unwrap();
    assert_eq!(settings.model_id, "llama3.2");
    assert_eq!(settings.system_prompt.as_deref(), Some("Think aloud."));

    let err = settings_for(&["parley", "--profile", "missing"], &config).unwrap_err();
    assert!(err.contains("No profile matches 'missing'"));
}

#[test]
fn env_only_uses_an_empty_memory_store() {
    let args = parse_args(&["parley", "--env-only"]);
    let store = credential_store(&args.session, &Config::default()).unwrap();
    assert_eq!(store.load("openai").unwrap(), None);
}

#[test]
fn missing_key_suggests_auth_and_env_var() {
    let err = PipelineError::Credentials(CredentialError::Missing {
        provider_id: "groq".into(),
        env_var: Some("GROQ_API_KEY".into()),
    });
    assert_eq!(
        turn::quick_fixes(&err),
        vec![
            "parley auth groq".to_string(),
            "export GROQ_API_KEY=\"your-api-key\"".to_string()
        ]
    );
    assert!(turn::quick_fixes(&PipelineError::NothingToRetry).is_empty());
}

#[test]
fn catalog_models_show_capabilities_and_exclusions() {
    let provider = builtin_providers::get("openai").unwrap();
    let line = model_list::describe_catalog_model(provider.model("o1-mini").unwrap());
    assert!(line.starts_with("o1-mini"));
    assert!(line.contains("no system prompt"));
}

#[test]
fn adopting_settings_rewrites_the_defaults() {
    let mut config = config_with_default();
    let settings = ChatSettings {
        provider_id: "groq".into(),
        model_id: "llama-3.3-70b-versatile".into(),
        system_prompt: None,
        parameters: ModelParameters::default(),
    };
    config.adopt_settings(settings);
    assert_eq!(config.default_provider.as_deref(), Some("groq"));
    assert_eq!(
        config.get_default_model("groq").map(String::as_str),
        Some("llama-3.3-70b-versatile")
    );
    assert_eq!(config.system_prompt, None);
}
