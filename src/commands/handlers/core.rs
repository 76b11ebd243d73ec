use super::text_arg;
use crate::commands::registry::CommandInvocation;
use crate::commands::{all_commands, matching_commands, CommandContext, CommandResult};
use crate::utils::calc;

pub(crate) fn handle_help(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let commands = match invocation.arg(0) {
        Some(prefix) => matching_commands(prefix.trim_start_matches('/')),
        None => all_commands().iter().collect(),
    };
    if commands.is_empty() {
        return CommandResult::Output(format!("No commands match '{}'.", invocation.args));
    }

    let width = commands.iter().map(|c| c.usage.len()).max().unwrap_or(0);
    let mut out = String::from("Commands:\n");
    for command in commands {
        out.push_str(&format!("  {:<width$}  {}\n", command.usage, command.help));
    }
    out.push_str("Anything else is sent to the model.");
    CommandResult::Output(out)
}

pub(crate) fn handle_calc(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let expression = match text_arg(&invocation) {
        Ok(expression) => expression,
        Err(usage) => return usage,
    };
    match calc::evaluate(expression) {
        Ok(value) => CommandResult::Output(format!("{expression} = {}", calc::format_number(value))),
        Err(err) => CommandResult::Output(format!("Calc error: {err}")),
    }
}
