pub(super) mod chance;
pub(super) mod core;
pub(super) mod text;
pub(super) mod time;

use crate::commands::registry::CommandInvocation;
use crate::commands::{find_command, CommandResult};

pub(super) fn usage(invocation: &CommandInvocation<'_>) -> CommandResult {
    let name = invocation
        .input
        .trim_start_matches('/')
        .split_whitespace()
        .next()
        .unwrap_or_default();
    match find_command(name) {
        Some(command) => CommandResult::Output(format!("Usage: {}", command.usage)),
        None => CommandResult::Output("Usage: /help".to_string()),
    }
}

/// The argument text, or the command's usage line when there is none.
pub(super) fn text_arg<'a>(invocation: &CommandInvocation<'a>) -> Result<&'a str, CommandResult> {
    if invocation.args.is_empty() {
        Err(usage(invocation))
    } else {
        Ok(invocation.args)
    }
}
