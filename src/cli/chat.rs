//! Interactive line-oriented chat.

use std::error::Error;
use std::io::{self, Write};

use super::input::LineSource;
use super::turn::{drive, drive_turn, report_error};
use super::{build_session, Session, SessionArgs};
use crate::commands::{self, CommandContext, CommandResult};
use crate::core::builtin_providers::{display_model, display_provider};
use crate::core::config::Config;
use crate::core::conversation::Conversation;
use crate::core::inline::{self, ToolElicitRequest};
use crate::core::message::Role;
use crate::core::pipeline::{TurnInput, TurnOutcome};

/// Commands the REPL answers itself, ahead of the slash interpreter.
enum ReplCommand {
    Quit,
    Retry,
    RunPending,
    Star,
    Starred,
    Artifact,
    ToggleLog,
}

fn parse_repl_command(line: &str) -> Option<ReplCommand> {
    match line.trim().to_ascii_lowercase().as_str() {
        "/quit" | "/exit" => Some(ReplCommand::Quit),
        "/retry" => Some(ReplCommand::Retry),
        "/run" => Some(ReplCommand::RunPending),
        "/star" => Some(ReplCommand::Star),
        "/starred" => Some(ReplCommand::Starred),
        "/artifact" => Some(ReplCommand::Artifact),
        "/log" => Some(ReplCommand::ToggleLog),
        _ => None,
    }
}

struct ChatLoop {
    session: Session,
    conversation: Conversation,
    lines: LineSource,
    commands: CommandContext,
    pending_tools: Vec<ToolElicitRequest>,
    logged: usize,
}

pub async fn run_chat(args: &SessionArgs) -> Result<(), Box<dyn Error>> {
    let session = build_session(args)?;
    println!(
        "Chatting with {} / {}. Type /help for commands, Ctrl+C to cancel a reply.",
        display_provider(&session.settings.provider_id),
        display_model(&session.settings.provider_id, &session.settings.model_id)
    );
    if !session.attachments.is_empty() {
        println!("{} file(s) will be attached to your first message.", session.attachments.len());
    }

    let mut chat = ChatLoop {
        session,
        conversation: Conversation::new("Chat"),
        lines: LineSource::stdin(),
        commands: CommandContext::new(),
        pending_tools: Vec::new(),
        logged: 0,
    };
    chat.run().await
}

impl ChatLoop {
    async fn run(&mut self) -> Result<(), Box<dyn Error>> {
        loop {
            print!("> ");
            io::stdout().flush()?;
            let line = tokio::select! {
                line = self.lines.next_line() => line,
                _ = tokio::signal::ctrl_c() => None,
            };
            let Some(line) = line else {
                println!();
                return Ok(());
            };
            if line.trim().is_empty() {
                continue;
            }

            if let Some(command) = parse_repl_command(&line) {
                match command {
                    ReplCommand::Quit => return Ok(()),
                    ReplCommand::Retry => self.turn(TurnInput::Retry).await,
                    ReplCommand::RunPending => self.run_pending().await,
                    ReplCommand::Star => self.toggle_star()?,
                    ReplCommand::Starred => self.show_starred()?,
                    ReplCommand::Artifact => self.show_artifact(),
                    ReplCommand::ToggleLog => match self.session.transcript.toggle("Logging paused") {
                        Ok(message) => println!("{message}"),
                        Err(err) => println!("{err}"),
                    },
                }
                continue;
            }

            match commands::process_input(&mut self.commands, &line) {
                CommandResult::Output(text) => println!("{text}"),
                CommandResult::ProcessAsMessage(text) => {
                    let attachments = std::mem::take(&mut self.session.attachments);
                    self.turn(TurnInput::User { text, attachments }).await;
                }
            }
        }
    }

    async fn turn(&mut self, input: TurnInput) {
        self.pending_tools.clear();
        let result = drive_turn(
            &self.session.pipeline,
            &mut self.conversation,
            &self.session.settings,
            input,
            &mut self.lines,
        )
        .await;
        self.log_new_messages();

        match result {
            Ok(TurnOutcome::Completed { pending_tools, .. }) if !pending_tools.is_empty() => {
                println!(
                    "{} tool request(s) waiting. Type /run to run them.",
                    pending_tools.len()
                );
                self.pending_tools = pending_tools;
            }
            Ok(TurnOutcome::HopLimitReached { pending_tools, .. }) => {
                println!("Type /run to run the remaining tool request(s) and continue.");
                self.pending_tools = pending_tools;
            }
            Ok(TurnOutcome::HumanCancelled { .. }) => println!("[dismissed]"),
            Ok(_) => {}
            Err(err) => {
                report_error(&err);
                println!("Type /retry to try again.");
            }
        }
    }

    async fn run_pending(&mut self) {
        if self.pending_tools.is_empty() {
            println!("No tool requests are waiting.");
            return;
        }
        for request in std::mem::take(&mut self.pending_tools) {
            let pipeline = &self.session.pipeline;
            let outcome = drive(
                pipeline,
                pipeline.run_tool(&mut self.conversation, &request),
                &mut self.lines,
            )
            .await;
            if outcome.is_none() {
                println!("[dismissed]");
                self.log_new_messages();
                return;
            }
        }
        self.log_new_messages();
        self.turn(TurnInput::Retry).await;
    }

    fn log_new_messages(&mut self) {
        for message in &self.conversation.messages()[self.logged..] {
            if let Err(err) = self.session.transcript.log_message(message) {
                tracing::warn!(error = %err, "Transcript write failed");
            }
        }
        self.logged = self.conversation.len();
    }

    fn last_reply_id(&self) -> Option<String> {
        self.conversation
            .messages()
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant && !m.is_errored())
            .map(|m| m.id.clone())
    }

    fn toggle_star(&self) -> Result<(), Box<dyn Error>> {
        let Some(message_id) = self.last_reply_id() else {
            println!("Nothing to star yet.");
            return Ok(());
        };
        let conversation_id = self.conversation.id.clone();
        let starred = Config::mutate(move |config| Ok(config.starred.toggle(&conversation_id, &message_id)))?;
        println!("{}", if starred { "Starred." } else { "Unstarred." });
        Ok(())
    }

    fn show_starred(&self) -> Result<(), Box<dyn Error>> {
        let config = Config::load()?;
        let starred = config.starred.starred_in(&self.conversation);
        if starred.is_empty() {
            println!("No starred replies in this chat.");
        }
        for message in starred {
            println!("* {}", message.text());
        }
        Ok(())
    }

    fn show_artifact(&self) {
        let artifact = self
            .conversation
            .messages()
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .find_map(|m| inline::find_artifact(&m.text()));
        match artifact {
            Some(artifact) => {
                let title = artifact.title.as_deref().unwrap_or("untitled");
                println!("[{} artifact: {title}]", artifact.kind);
                println!("{}", artifact.code);
            }
            None => println!("No artifact in this chat yet."),
        }
    }
}
