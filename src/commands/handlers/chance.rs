use super::usage;
use crate::commands::registry::CommandInvocation;
use crate::commands::{CommandContext, CommandResult};
use rand::Rng;

const MAX_DICE: u32 = 100;
const MAX_SIDES: u32 = 1000;
const MAX_MODIFIER: i64 = 1_000_000;
const DEFAULT_PASSWORD_LEN: usize = 16;
const PASSWORD_LEN_RANGE: std::ops::RangeInclusive<usize> = 4..=128;
const PASSWORD_CHARSET: &[u8] =
    b"ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz23456789!@#$%^&*-_=+?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DiceSpec {
    pub count: u32,
    pub sides: u32,
    pub modifier: i64,
}

impl Default for DiceSpec {
    fn default() -> Self {
        Self {
            count: 1,
            sides: 6,
            modifier: 0,
        }
    }
}

/// Parse `NdM`, `dM`, `NdM+K` or `NdM-K`.
pub(crate) fn parse_dice(spec: &str) -> Option<DiceSpec> {
    let spec = spec.trim().to_ascii_lowercase();
    let (count, rest) = spec.split_once('d')?;
    let count = if count.is_empty() {
        1
    } else {
        count.parse().ok()?
    };

    let (sides, modifier) = match rest.find(['+', '-']) {
        Some(pos) => {
            let modifier: i64 = rest[pos + 1..].parse().ok()?;
            let modifier = if rest.as_bytes()[pos] == b'-' {
                -modifier
            } else {
                modifier
            };
            (rest[..pos].parse().ok()?, modifier)
        }
        None => (rest.parse().ok()?, 0),
    };

    if !(1..=MAX_DICE).contains(&count)
        || !(2..=MAX_SIDES).contains(&sides)
        || modifier.abs() > MAX_MODIFIER
    {
        return None;
    }
    Some(DiceSpec {
        count,
        sides,
        modifier,
    })
}

fn format_roll(spec: &str, rolls: &[u32], modifier: i64) -> String {
    let sum: i64 = rolls.iter().map(|&r| i64::from(r)).sum::<i64>() + modifier;
    if rolls.len() == 1 && modifier == 0 {
        return format!("{spec}: {sum}");
    }
    let mut terms: Vec<String> = rolls.iter().map(u32::to_string).collect();
    match modifier.cmp(&0) {
        std::cmp::Ordering::Greater => terms.push(modifier.to_string()),
        std::cmp::Ordering::Less => {
            let last = terms.pop().unwrap_or_default();
            terms.push(format!("{last} - {}", -modifier));
        }
        std::cmp::Ordering::Equal => {}
    }
    format!("{spec}: {} = {sum}", terms.join(" + "))
}

pub(crate) fn handle_roll(context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let (label, dice) = match invocation.arg(0) {
        None => ("1d6".to_string(), DiceSpec::default()),
        Some(raw) => match parse_dice(raw) {
            Some(dice) => (raw.to_ascii_lowercase(), dice),
            None => return usage(&invocation),
        },
    };
    let rng = context.rng();
    let rolls: Vec<u32> = (0..dice.count).map(|_| rng.gen_range(1..=dice.sides)).collect();
    CommandResult::Output(format_roll(&label, &rolls, dice.modifier))
}

pub(crate) fn handle_flip(context: &mut CommandContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    let side = if context.rng().gen_bool(0.5) { "Heads" } else { "Tails" };
    CommandResult::Output(side.to_string())
}

pub(crate) fn handle_random(context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let (min, max) = match invocation.arg_count() {
        0 => (1, 100),
        2 => {
            let bounds = invocation
                .arg(0)
                .and_then(|v| v.parse::<i64>().ok())
                .zip(invocation.arg(1).and_then(|v| v.parse::<i64>().ok()));
            match bounds {
                Some((min, max)) if min <= max => (min, max),
                _ => return usage(&invocation),
            }
        }
        _ => return usage(&invocation),
    };
    let value = context.rng().gen_range(min..=max);
    CommandResult::Output(format!("{value} (between {min} and {max})"))
}

pub(crate) fn handle_password(context: &mut CommandContext, invocation: CommandInvocation<'_>) -> CommandResult {
    let length = match invocation.arg(0) {
        None => DEFAULT_PASSWORD_LEN,
        Some(raw) => match raw.parse::<usize>() {
            Ok(length) if PASSWORD_LEN_RANGE.contains(&length) => length,
            _ => return usage(&invocation),
        },
    };
    let rng = context.rng();
    let password: String = (0..length)
        .map(|_| char::from(PASSWORD_CHARSET[rng.gen_range(0..PASSWORD_CHARSET.len())]))
        .collect();
    CommandResult::Output(password)
}

pub(crate) fn handle_uuid(context: &mut CommandContext, _invocation: CommandInvocation<'_>) -> CommandResult {
    let uuid = uuid::Builder::from_random_bytes(context.rng().gen()).into_uuid();
    CommandResult::Output(uuid.to_string())
}
