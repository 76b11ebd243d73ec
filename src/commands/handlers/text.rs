use super::text_arg;
use crate::commands::registry::CommandInvocation;
use crate::commands::{CommandContext, CommandResult};
use base64::Engine;

/// Split on punctuation and whitespace, and between a lower-case letter or
/// digit and a following capital, so `parseHTTPResponse body` yields
/// `parse`, `HTTPResponse`, `body`.
pub(crate) fn words(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut prev: Option<char> = None;
    for ch in text.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            prev = None;
            continue;
        }
        if ch.is_uppercase()
            && prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit())
            && !current.is_empty()
        {
            words.push(std::mem::take(&mut current));
        }
        current.push(ch);
        prev = Some(ch);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

pub(crate) fn to_title(text: &str) -> String {
    text.split(' ')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join(" ")
}

pub(crate) fn to_snake(text: &str) -> String {
    joined_lower(text, "_")
}

pub(crate) fn to_kebab(text: &str) -> String {
    joined_lower(text, "-")
}

fn joined_lower(text: &str, separator: &str) -> String {
    words(text)
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join(separator)
}

pub(crate) fn to_camel(text: &str) -> String {
    words(text)
        .iter()
        .enumerate()
        .map(|(i, w)| if i == 0 { w.to_lowercase() } else { capitalize(w) })
        .collect()
}

fn transform(invocation: &CommandInvocation<'_>, f: impl FnOnce(&str) -> String) -> CommandResult {
    match text_arg(invocation) {
        Ok(text) => CommandResult::Output(f(text)),
        Err(usage) => usage,
    }
}

pub(crate) fn handle_upper(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, str::to_uppercase)
}

pub(crate) fn handle_lower(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, str::to_lowercase)
}

pub(crate) fn handle_title(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, to_title)
}

pub(crate) fn handle_snake(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, to_snake)
}

pub(crate) fn handle_kebab(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, to_kebab)
}

pub(crate) fn handle_camel(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, to_camel)
}

pub(crate) fn handle_reverse(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, |text| text.chars().rev().collect())
}

pub(crate) fn handle_count(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, |text| {
        format!(
            "{} characters, {} words, {} lines",
            text.chars().count(),
            text.split_whitespace().count(),
            text.lines().count()
        )
    })
}

pub(crate) fn handle_base64(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    transform(&invocation, |text| {
        base64::engine::general_purpose::STANDARD.encode(text)
    })
}

pub(crate) fn handle_unbase64(_context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let data = match text_arg(&invocation) {
        Ok(data) => data,
        Err(usage) => return usage,
    };
    let compact: String = data.split_whitespace().collect();
    match base64::engine::general_purpose::STANDARD.decode(compact) {
        Ok(bytes) => match String::from_utf8(bytes) {
            Ok(text) => CommandResult::Output(text),
            Err(err) => CommandResult::Output(format!(
                "Decoded {} bytes that are not valid UTF-8.",
                err.as_bytes().len()
            )),
        },
        Err(err) => CommandResult::Output(format!("Invalid base64: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_split_on_case_and_punctuation() {
        assert_eq!(words("hello world"), ["hello", "world"]);
        assert_eq!(words("parseHTTPResponse body"), ["parse", "HTTPResponse", "body"]);
        assert_eq!(words("snake_case-and-kebab"), ["snake", "case", "and", "kebab"]);
        assert_eq!(words("  --  "), Vec::<String>::new());
    }

    #[test]
    fn case_conversions() {
        assert_eq!(to_snake("Hello World"), "hello_world");
        assert_eq!(to_kebab("someVariableName"), "some-variable-name");
        assert_eq!(to_camel("user id field"), "userIdField");
        assert_eq!(to_title("the quick  BROWN fox"), "The Quick  Brown Fox");
    }
}
