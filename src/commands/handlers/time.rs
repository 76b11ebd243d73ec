use crate::commands::registry::CommandInvocation;
use crate::commands::{CommandContext, CommandResult};
use chrono::{DateTime, TimeZone};
use std::fmt::{Display, Write};

const DEFAULT_DATE_FORMAT: &str = "%A, %B %-d, %Y";

/// Render with a user-supplied strftime pattern. An invalid pattern is an
/// error rather than a panic inside `Display`.
pub(crate) fn format_with<Tz: TimeZone>(now: &DateTime<Tz>, pattern: &str) -> Option<String>
where
    Tz::Offset: Display,
{
    let mut rendered = String::new();
    write!(rendered, "{}", now.format(pattern)).ok()?;
    Some(rendered)
}

pub(crate) fn handle_date(context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let pattern = if invocation.args.is_empty() {
        DEFAULT_DATE_FORMAT
    } else {
        invocation.args
    };
    match format_with(&context.now(), pattern) {
        Some(rendered) => CommandResult::Output(rendered),
        None => CommandResult::Output(format!("Invalid date format '{pattern}'")),
    }
}

pub(crate) fn handle_time(context: &mut CommandContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Output(context.now().format("%H:%M:%S %Z").to_string())
}

pub(crate) fn handle_timestamp(context: &mut CommandContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    CommandResult::Output(context.now().timestamp().to_string())
}
