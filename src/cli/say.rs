//! One-shot prompt without the interactive loop.

use std::error::Error;

use super::input::LineSource;
use super::turn::{drive_turn, report_error};
use super::{build_session, SessionArgs};
use crate::core::conversation::Conversation;
use crate::core::pipeline::{TurnInput, TurnOutcome};

pub async fn run_say(args: &SessionArgs, prompt: String) -> Result<(), Box<dyn Error>> {
    if prompt.trim().is_empty() {
        return Err("Usage: parley say <prompt>".into());
    }

    let mut session = build_session(args)?;
    let mut conversation = Conversation::new("say");
    let mut lines = LineSource::stdin();
    let input = TurnInput::User {
        text: prompt,
        attachments: std::mem::take(&mut session.attachments),
    };

    let result = drive_turn(
        &session.pipeline,
        &mut conversation,
        &session.settings,
        input,
        &mut lines,
    )
    .await;

    for message in conversation.messages() {
        session.transcript.log_message(message)?;
    }

    match result {
        Ok(TurnOutcome::Completed { pending_tools, .. }) if !pending_tools.is_empty() => {
            eprintln!("{} tool request(s) were not run.", pending_tools.len());
            Ok(())
        }
        Ok(TurnOutcome::Cancelled { .. }) | Ok(TurnOutcome::HumanCancelled { .. }) => {
            std::process::exit(130);
        }
        Ok(_) => Ok(()),
        Err(err) => {
            report_error(&err);
            std::process::exit(1);
        }
    }
}
