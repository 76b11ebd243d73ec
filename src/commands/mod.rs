//! Slash commands answered locally, ahead of the model.
//!
//! Input that names a registered command is computed on the spot and never
//! reaches a provider. Anything else, including unknown `/word` input, comes
//! back as [`CommandResult::ProcessAsMessage`] for normal dispatch.

mod handlers;
mod registry;


pub use registry::{all_commands, find_command, matching_commands, Command, CommandInvocation};

use chrono::{DateTime, Local};
use rand::rngs::StdRng;
use rand::SeedableRng;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Text to show in place of a model reply.
    Output(String),
    /// Not a command; send the input to the model unchanged.
    ProcessAsMessage(String),
}

/// Sources of randomness and time the handlers draw from.
pub struct CommandContext {
    rng: StdRng,
    fixed_now: Option<DateTime<Local>>,
}

impl Default for CommandContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandContext {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
            fixed_now: None,
        }
    }

    /// Seeded randomness and a frozen clock.
    pub fn deterministic(seed: u64, now: DateTime<Local>) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            fixed_now: Some(now),
        }
    }

    pub(crate) fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    pub(crate) fn now(&self) -> DateTime<Local> {
        self.fixed_now.unwrap_or_else(Local::now)
    }
}

pub fn process_input(context: &mut CommandContext, input: &str) -> CommandResult {
    let trimmed = input.trim();

    let Some(body) = trimmed.strip_prefix('/') else {
        return CommandResult::ProcessAsMessage(input.to_string());
    };

    let mut parts = body.splitn(2, char::is_whitespace);
    let command_name = match parts.next() {
        Some(name) if !name.is_empty() => name,
        _ => return CommandResult::ProcessAsMessage(input.to_string()),
    };
    let args = parts.next().unwrap_or("").trim();

    match registry::find_command(command_name) {
        Some(command) => {
            let invocation = CommandInvocation {
                input: trimmed,
                args,
            };
            (command.handler)(context, invocation)
        }
        None => CommandResult::ProcessAsMessage(input.to_string()),
    }
}
