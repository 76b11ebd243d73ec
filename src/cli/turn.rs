use std::future::Future;
use std::io::{self, Write};

use tokio::sync::broadcast::error::RecvError;

use super::human_prompt;
use super::input::LineSource;
use crate::core::conversation::Conversation;
use crate::core::pipeline::{PipelineError, PipelineEvent, SessionPipeline, TurnInput, TurnOutcome};
use crate::core::settings::ChatSettings;
use crate::core::tools::ToolStatus;

/// Run one turn while echoing deltas to stdout, presenting human-input
/// prompts on the terminal and cancelling on Ctrl-C.
pub async fn drive_turn(
    pipeline: &SessionPipeline,
    conversation: &mut Conversation,
    settings: &ChatSettings,
    input: TurnInput,
    lines: &mut LineSource,
) -> Result<TurnOutcome, PipelineError> {
    drive(pipeline, pipeline.run_turn(conversation, settings, input), lines).await
}

/// Poll `work` to completion with the pipeline's terminal plumbing attached.
pub async fn drive<F: Future>(pipeline: &SessionPipeline, work: F, lines: &mut LineSource) -> F::Output {
    let mut events = pipeline.subscribe();
    let mut prompts = pipeline.broker().subscribe();
    prompts.mark_unchanged();

    let turn = work;
    tokio::pin!(turn);

    loop {
        tokio::select! {
            outcome = &mut turn => {
                // Deltas sent just before completion are still queued.
                while let Ok(event) = events.try_recv() {
                    render_event(&event);
                }
                println!();
                return outcome;
            }
            event = events.recv() => match event {
                Ok(event) => render_event(&event),
                Err(RecvError::Lagged(skipped)) => tracing::debug!(skipped, "Event receiver lagged"),
                Err(RecvError::Closed) => {}
            },
            changed = prompts.changed() => {
                if changed.is_err() {
                    continue;
                }
                let prompt = prompts.borrow_and_update().clone();
                if let Some(prompt) = prompt {
                    tokio::select! {
                        _ = human_prompt::present(pipeline.broker(), prompt, lines) => {}
                        _ = tokio::signal::ctrl_c() => {
                            pipeline.cancel();
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if pipeline.cancel() {
                    eprintln!("\n[cancelled]");
                }
            }
        }
    }
}

fn render_event(event: &PipelineEvent) {
    match event {
        PipelineEvent::Delta { delta, .. } => {
            print!("{delta}");
            let _ = io::stdout().flush();
        }
        PipelineEvent::ToolResult { outcome, .. } => {
            let status = match outcome.status {
                ToolStatus::Success => "ok",
                ToolStatus::Failed => "failed",
                ToolStatus::Denied => "denied",
                ToolStatus::Unknown => "unknown tool",
            };
            println!("\n[tool {}: {status}]", outcome.tool);
        }
        PipelineEvent::Notice(notice) => eprintln!("\n[{notice}]"),
        PipelineEvent::StateChanged(_) | PipelineEvent::Parsed { .. } => {}
    }
}

/// Hints printed under a failed turn.
pub fn quick_fixes(err: &PipelineError) -> Vec<String> {
    match err {
        PipelineError::UnknownProvider(_) => vec!["Run `parley providers` to see the known providers.".into()],
        PipelineError::Credentials(crate::core::credentials::CredentialError::Missing {
            provider_id,
            env_var,
        }) => {
            let mut fixes = vec![format!("parley auth {provider_id}")];
            if let Some(var) = env_var {
                fixes.push(format!("export {var}=\"your-api-key\""));
            }
            fixes
        }
        PipelineError::Credentials(err) if err.is_recoverable() => {
            vec!["Use --env-only to skip the keyring and read keys from the environment.".into()]
        }
        _ => Vec::new(),
    }
}

pub fn report_error(err: &PipelineError) {
    eprintln!("Error: {err}");
    let fixes = quick_fixes(err);
    if !fixes.is_empty() {
        eprintln!();
        eprintln!("Quick fixes:");
        for fix in fixes {
            eprintln!("  - {fix}");
        }
    }
}
