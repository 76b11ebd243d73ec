use super::{handlers, CommandContext, CommandResult};

pub type CommandHandler = fn(&mut CommandContext, CommandInvocation<'_>) -> CommandResult;

pub struct Command {
    pub name: &'static str,
    pub usage: &'static str,
    pub help: &'static str,
    pub handler: CommandHandler,
}

#[derive(Clone, Copy)]
pub struct CommandInvocation<'a> {
    pub input: &'a str,
    pub args: &'a str,
}

impl<'a> CommandInvocation<'a> {
    pub fn arg(&self, index: usize) -> Option<&'a str> {
        self.args.split_whitespace().nth(index)
    }

    pub fn arg_count(&self) -> usize {
        self.args.split_whitespace().count()
    }
}

pub fn all_commands() -> &'static [Command] {
    COMMANDS
}

pub fn find_command(name: &str) -> Option<&'static Command> {
    all_commands()
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}

pub fn matching_commands(prefix: &str) -> Vec<&'static Command> {
    let prefix = prefix.to_ascii_lowercase();
    all_commands()
        .iter()
        .filter(|command| command.name.starts_with(&prefix))
        .collect()
}

const COMMANDS: &[Command] = &[
    Command {
        name: "help",
        usage: "/help [prefix]",
        help: "List commands, optionally only those starting with a prefix.",
        handler: handlers::core::handle_help,
    },
    Command {
        name: "calc",
        usage: "/calc <expression>",
        help: "Evaluate an arithmetic expression.",
        handler: handlers::core::handle_calc,
    },
    Command {
        name: "uuid",
        usage: "/uuid",
        help: "Generate a random UUID.",
        handler: handlers::chance::handle_uuid,
    },
    Command {
        name: "roll",
        usage: "/roll [NdM[+K]]",
        help: "Roll dice, one d6 by default.",
        handler: handlers::chance::handle_roll,
    },
    Command {
        name: "flip",
        usage: "/flip",
        help: "Flip a coin.",
        handler: handlers::chance::handle_flip,
    },
    Command {
        name: "random",
        usage: "/random [min max]",
        help: "Pick a whole number in a range, 1 to 100 by default.",
        handler: handlers::chance::handle_random,
    },
    Command {
        name: "password",
        usage: "/password [length]",
        help: "Generate a random password, 16 characters by default.",
        handler: handlers::chance::handle_password,
    },
    Command {
        name: "date",
        usage: "/date [format]",
        help: "Show today's date, optionally with a strftime format.",
        handler: handlers::time::handle_date,
    },
    Command {
        name: "time",
        usage: "/time",
        help: "Show the local time.",
        handler: handlers::time::handle_time,
    },
    Command {
        name: "timestamp",
        usage: "/timestamp",
        help: "Show the current Unix timestamp.",
        handler: handlers::time::handle_timestamp,
    },
    Command {
        name: "upper",
        usage: "/upper <text>",
        help: "Convert text to UPPER CASE.",
        handler: handlers::text::handle_upper,
    },
    Command {
        name: "lower",
        usage: "/lower <text>",
        help: "Convert text to lower case.",
        handler: handlers::text::handle_lower,
    },
    Command {
        name: "title",
        usage: "/title <text>",
        help: "Convert text to Title Case.",
        handler: handlers::text::handle_title,
    },
    Command {
        name: "snake",
        usage: "/snake <text>",
        help: "Convert text to snake_case.",
        handler: handlers::text::handle_snake,
    },
    Command {
        name: "kebab",
        usage: "/kebab <text>",
        help: "Convert text to kebab-case.",
        handler: handlers::text::handle_kebab,
    },
    Command {
        name: "camel",
        usage: "/camel <text>",
        help: "Convert text to camelCase.",
        handler: handlers::text::handle_camel,
    },
    Command {
        name: "reverse",
        usage: "/reverse <text>",
        help: "Reverse text.",
        handler: handlers::text::handle_reverse,
    },
    Command {
        name: "count",
        usage: "/count <text>",
        help: "Count characters, words and lines.",
        handler: handlers::text::handle_count,
    },
    Command {
        name: "base64",
        usage: "/base64 <text>",
        help: "Encode text as base64.",
        handler: handlers::text::handle_base64,
    },
    Command {
        name: "unbase64",
        usage: "/unbase64 <data>",
        help: "Decode base64 into text.",
        handler: handlers::text::handle_unbase64,
    },
];
