//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments, assembles a session from config
//! and flags, and dispatches to the selected subcommand.

mod auth;
mod chat;
mod human_prompt;
mod input;
mod model_list;
mod profile;
mod provider_list;
mod say;
mod turn;

#[cfg(test)]
mod tests;

use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::debug;

use crate::core::attachments::AttachedFile;
use crate::core::builtin_providers;
use crate::core::chat_stream::HttpTransport;
use crate::core::config::Config;
use crate::core::credentials::{
    resolve_api_key, CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
};
use crate::core::human_input::HumanInputBroker;
use crate::core::pipeline::{PipelineOptions, SessionPipeline};
use crate::core::profile::ProfileManager;
use crate::core::settings::ChatSettings;
use crate::core::tools::ToolRegistry;
use crate::utils::logging::{init_tracing, TranscriptLog};

#[derive(Parser, Debug)]
#[command(name = "parley", version)]
#[command(about = "Stream conversations with LLM providers, with inline tools and human-in-the-loop prompts")]
#[command(
    long_about = "Parley is a line-oriented chat client that streams replies from several LLM \
providers. Replies can ask for client-side tools through fenced `tool_elicit` blocks; tools \
that need a person pause the turn and ask on the terminal.\n\n\
Authentication:\n\
  Use 'parley auth <provider>' to store an API key, or set the provider's environment variable\n\
  (for example OPENAI_API_KEY). Ollama needs no key.\n\n\
Controls:\n\
  Enter             Send the message\n\
  Ctrl+C            Cancel the reply in progress, or quit when idle\n\
  /help             List local commands\n\
  /retry            Ask for the last reply again\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub session: SessionArgs,
}

/// Flags that shape the chat session, accepted by every subcommand.
#[derive(ClapArgs, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Provider to use (overrides the configured default)
    #[arg(short = 'p', long, global = true, value_name = "PROVIDER")]
    pub provider: Option<String>,

    /// Model to use (overrides the configured default for the provider)
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Apply a saved profile by id or name before other flags
    #[arg(long, global = true, value_name = "PROFILE")]
    pub profile: Option<String>,

    /// System prompt for this session
    #[arg(long, global = true, value_name = "PROMPT")]
    pub system: Option<String>,

    /// Attach a file to the first message (repeatable)
    #[arg(long = "attach", global = true, value_name = "FILE")]
    pub attachments: Vec<PathBuf>,

    /// Do not offer client tools to the model
    #[arg(long, global = true)]
    pub no_tools: bool,

    /// Read API keys from environment variables only
    #[arg(long, global = true)]
    pub env_only: bool,

    /// Append the transcript to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Write diagnostics to this file (filter with PARLEY_LOG)
    #[arg(long, global = true, value_name = "FILE")]
    pub debug_log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Send one prompt and print the reply
    Say {
        /// Prompt text; multiple words are joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
    },
    /// List built-in providers and whether a key is available
    Providers,
    /// List models for the selected provider
    Models {
        /// Query the provider's model endpoint instead of the built-in catalog
        #[arg(long)]
        remote: bool,
    },
    /// Store an API key for a provider
    Auth {
        provider: String,
    },
    /// Remove the stored API key for a provider
    Deauth {
        provider: String,
    },
    /// Manage saved profiles
    Profile {
        #[command(subcommand)]
        action: ProfileCommand,
    },
    /// Show the current configuration
    Config,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Save the current provider, model, system prompt and parameters
    Save {
        #[arg(trailing_var_arg = true, required = true)]
        name: Vec<String>,
    },
    /// List saved profiles
    List,
    /// Make a profile's settings the configured defaults
    Apply { profile: String },
    /// Delete a profile by id or name
    Delete { profile: String },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.session.debug_log.as_deref())?;
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let session = args.session;
    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => chat::run_chat(&session).await,
        Commands::Say { prompt } => say::run_say(&session, prompt.join(" ")).await,
        Commands::Providers => provider_list::list_providers(&session),
        Commands::Models { remote } => model_list::list_models(&session, remote).await,
        Commands::Auth { provider } => auth::run_auth(&session, &provider),
        Commands::Deauth { provider } => auth::run_deauth(&session, &provider),
        Commands::Profile { action } => profile::run_profile(&session, action),
        Commands::Config => {
            let config = Config::load()?;
            println!("Config file: {}", Config::active_path()?.display());
            config.print_all();
            Ok(())
        }
    }
}

/// Key storage for this invocation: environment only, the OS keyring, or the
/// obfuscated file next to the config.
pub(crate) fn credential_store(
    args: &SessionArgs,
    config: &Config,
) -> Result<Arc<dyn CredentialStore>, Box<dyn Error>> {
    if args.env_only {
        return Ok(Arc::new(MemoryCredentialStore::new()));
    }
    if config.use_keyring() {
        return Ok(Arc::new(KeyringCredentialStore::new()));
    }
    let config_path = Config::active_path()?;
    let dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."));
    Ok(Arc::new(FileCredentialStore::in_dir(&dir)))
}

/// Settings from config, then `--profile`, then explicit flags.
pub(crate) fn resolve_settings(
    args: &SessionArgs,
    config: &Config,
    store: &dyn CredentialStore,
) -> Result<ChatSettings, Box<dyn Error>> {
    let mut settings = ChatSettings::from_config(config, None, None);

    if let Some(wanted) = &args.profile {
        let profiles = ProfileManager::load(config);
        let profile = profiles
            .find(wanted)
            .ok_or_else(|| format!("No profile matches '{wanted}' (ids and unique names work)"))?;
        let mut applied = settings.take().unwrap_or_default();
        profiles.apply(&profile.id, &mut applied)?;
        settings = Some(applied);
    }

    if args.provider.is_some() || args.model.is_some() {
        if let Some(provider) = args.provider.as_deref() {
            if builtin_providers::get(provider).is_none() {
                return Err(format!("Unknown provider '{provider}'. Run `parley providers` to list them.").into());
            }
        }
        let current = settings.take();
        let provider = args
            .provider
            .clone()
            .or_else(|| current.as_ref().map(|s| s.provider_id.clone()));
        // A new provider brings its own default model.
        let model = args.model.clone().or_else(|| {
            current
                .as_ref()
                .filter(|_| args.provider.is_none())
                .map(|s| s.model_id.clone())
        });
        let mut explicit = ChatSettings::from_config(config, provider.as_deref(), model.as_deref())
            .ok_or("Pick a provider with -p and a model with -m")?;
        if let Some(current) = current {
            explicit.system_prompt = current.system_prompt;
            explicit.parameters = current.parameters;
        }
        settings = Some(explicit);
    }

    let mut settings = match settings {
        Some(settings) => settings,
        None => first_usable_provider(config, store)
            .ok_or("No provider selected. Use -p <provider>, or run `parley auth <provider>` first.")?,
    };

    if let Some(system) = &args.system {
        settings.system_prompt = Some(system.clone());
    }
    debug!(provider = %settings.provider_id, model = %settings.model_id, "Resolved chat settings");
    Ok(settings)
}

/// With nothing configured, pick the first provider whose key is available.
fn first_usable_provider(config: &Config, store: &dyn CredentialStore) -> Option<ChatSettings> {
    builtin_providers::all()
        .iter()
        .find(|provider| matches!(resolve_api_key(store, provider), Ok(Some(_))))
        .and_then(|provider| ChatSettings::from_config(config, Some(&provider.id), None))
}

/// Everything a chat or one-shot run needs.
pub(crate) struct Session {
    pub settings: ChatSettings,
    pub pipeline: SessionPipeline,
    pub attachments: Vec<AttachedFile>,
    pub transcript: TranscriptLog,
}

pub(crate) fn build_session(args: &SessionArgs) -> Result<Session, Box<dyn Error>> {
    let config = Config::load()?;
    let store = credential_store(args, &config)?;
    let settings = resolve_settings(args, &config, store.as_ref())?;

    let attachments = args
        .attachments
        .iter()
        .map(|path| AttachedFile::from_path(path))
        .collect::<Result<Vec<_>, _>>()?;

    let mut options = PipelineOptions::from_config(&config);
    options.tools_enabled = !args.no_tools;

    let client = reqwest::Client::new();
    let pipeline = SessionPipeline::new(
        Arc::new(HttpTransport::new(client.clone())),
        store,
        Arc::new(ToolRegistry::with_builtins(client)),
        HumanInputBroker::new(),
        options,
    );

    let transcript = TranscriptLog::new(args.log.clone().or_else(|| config.log_file.clone()))?;

    Ok(Session {
        settings,
        pipeline,
        attachments,
        transcript,
    })
}
