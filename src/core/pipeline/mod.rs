//! One conversation turn, end to end.
//!
//! A turn builds the request, streams the reply into a fresh assistant
//! message, re-parses the accumulated text after every delta and, once the
//! stream ends, runs any tool requests it found. Tools that need a person
//! suspend the turn on the [`HumanInputBroker`]; results are appended as tool
//! messages and trigger a follow-up request, up to the configured hop limit.
//!
//! Every exit path, including a dropped future, leaves the pipeline `Idle`.

mod request;

#[cfg(test)]
mod tests;

use crate::core::attachments::AttachedFile;
use crate::core::builtin_providers;
use crate::core::chat_stream::{ChatTransport, StreamMessage, StreamParams};
use crate::core::config::{Config, DEFAULT_MAX_TOOL_HOPS};
use crate::core::conversation::Conversation;
use crate::core::credentials::{resolve_api_key, CredentialError, CredentialStore};
use crate::core::human_input::{AnswerBag, HumanInputBroker, HumanInputOutcome};
use crate::core::inline::{self, ParsedMessage, ToolElicitRequest};
use crate::core::message::{Message, Role};
use crate::core::settings::ChatSettings;
use crate::core::tools::{HumanInputPolicy, ToolOutcome, ToolRegistry};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Building,
    Streaming,
    ParsingTail,
    AwaitingHuman,
    Errored,
    Cancelled,
}

#[derive(Debug, Clone)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    Delta {
        message_id: String,
        delta: String,
    },
    /// Reparse of the assistant message after a delta, or the final parse
    /// when `parsed` came from the finished text.
    Parsed {
        message_id: String,
        parsed: ParsedMessage,
        complete: bool,
    },
    ToolResult {
        message_id: String,
        outcome: ToolOutcome,
    },
    Notice(String),
}

pub enum TurnInput {
    User {
        text: String,
        attachments: Vec<AttachedFile>,
    },
    /// Re-send the current history without adding a message. Used to retry a
    /// failed reply or to continue after tools were run by hand.
    Retry,
}

impl TurnInput {
    pub fn text(text: impl Into<String>) -> Self {
        TurnInput::User {
            text: text.into(),
            attachments: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    /// The reply finished. `pending_tools` holds requests that were parsed but
    /// not run because automatic execution is off.
    Completed {
        message_id: String,
        hops: usize,
        pending_tools: Vec<ToolElicitRequest>,
    },
    /// The last reply asked for more tools after the hop limit was used up.
    HopLimitReached {
        message_id: String,
        hops: usize,
        pending_tools: Vec<ToolElicitRequest>,
    },
    /// The human dismissed a tool's question. Nothing was appended for the
    /// paused tool calls.
    HumanCancelled { message_id: String },
    /// The user aborted the turn. Text that had already arrived is kept.
    Cancelled { message_id: Option<String> },
}

#[derive(Debug, Clone)]
pub enum PipelineError {
    UnknownProvider(String),
    Credentials(CredentialError),
    /// `Retry` with no user or tool message to answer.
    NothingToRetry,
    /// The stream failed. The partial reply stays in the conversation with its
    /// error set.
    Transport { message_id: String, message: String },
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::UnknownProvider(id) => write!(f, "Unknown provider '{id}'"),
            PipelineError::Credentials(err) => write!(f, "{err}"),
            PipelineError::NothingToRetry => write!(f, "There is no message to retry"),
            PipelineError::Transport { message, .. } => write!(f, "{message}"),
        }
    }
}

impl Error for PipelineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineError::Credentials(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CredentialError> for PipelineError {
    fn from(err: CredentialError) -> Self {
        PipelineError::Credentials(err)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub max_tool_hops: usize,
    /// Run parsed tool requests as soon as a reply finishes.
    pub auto_run_tools: bool,
    /// Describe tools in the system prompt and act on `tool_elicit` blocks.
    pub tools_enabled: bool,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            max_tool_hops: DEFAULT_MAX_TOOL_HOPS,
            auto_run_tools: true,
            tools_enabled: true,
        }
    }
}

impl PipelineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tool_hops: config.max_tool_hops(),
            auto_run_tools: config.auto_run_tools(),
            tools_enabled: true,
        }
    }
}

enum StreamEnd {
    Finished,
    Failed(String),
    Cancelled,
}

enum HumanStep {
    Answer(Option<AnswerBag>),
    Dismissed,
    Aborted,
}

/// What came of running one batch of tool requests.
enum ToolBatch {
    Ran(Vec<(String, ToolOutcome)>),
    Dismissed,
    Aborted,
}

/// Returns the pipeline to `Idle` however a turn ends.
struct TurnGuard<'a> {
    pipeline: &'a SessionPipeline,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.pipeline.lock_turn().take();
        self.pipeline.set_state(PipelineState::Idle);
    }
}

#[derive(Default)]
struct TurnHandles {
    cancel: Option<CancellationToken>,
    human_request: Option<u64>,
}

pub struct SessionPipeline {
    transport: Arc<dyn ChatTransport>,
    credentials: Arc<dyn CredentialStore>,
    tools: Arc<ToolRegistry>,
    broker: HumanInputBroker,
    options: PipelineOptions,
    state: watch::Sender<PipelineState>,
    events: broadcast::Sender<PipelineEvent>,
    turn: Mutex<Option<TurnHandles>>,
}

impl SessionPipeline {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        credentials: Arc<dyn CredentialStore>,
        tools: Arc<ToolRegistry>,
        broker: HumanInputBroker,
        options: PipelineOptions,
    ) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        let (events, _) = broadcast::channel(256);
        Self {
            transport,
            credentials,
            tools,
            broker,
            options,
            state,
            events,
            turn: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.events.subscribe()
    }

    pub fn broker(&self) -> &HumanInputBroker {
        &self.broker
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Abort the in-flight turn: closes the stream and dismisses any question
    /// the turn is waiting on. Returns false when nothing was running.
    pub fn cancel(&self) -> bool {
        let (token, human_request) = match self.lock_turn().as_mut() {
            Some(handles) => (handles.cancel.clone(), handles.human_request.take()),
            None => return false,
        };
        if let Some(id) = human_request {
            let _ = self.broker.cancel(id);
        }
        match token {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    fn lock_turn(&self) -> MutexGuard<'_, Option<TurnHandles>> {
        self.turn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: PipelineState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Pipeline state");
            let _ = self.events.send(PipelineEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: PipelineEvent) {
        let _ = self.events.send(event);
    }

    fn begin_turn(&self) -> (TurnGuard<'_>, CancellationToken) {
        let token = CancellationToken::new();
        *self.lock_turn() = Some(TurnHandles {
            cancel: Some(token.clone()),
            human_request: None,
        });
        (TurnGuard { pipeline: self }, token)
    }

    fn fail(&self, error: PipelineError) -> Result<TurnOutcome, PipelineError> {
        warn!(error = %error, "Turn failed");
        self.set_state(PipelineState::Errored);
        self.emit(PipelineEvent::Notice(error.to_string()));
        Err(error)
    }

    fn cancelled(&self, message_id: Option<String>) -> Result<TurnOutcome, PipelineError> {
        info!(message_id = ?message_id, "Turn cancelled");
        self.set_state(PipelineState::Cancelled);
        Ok(TurnOutcome::Cancelled { message_id })
    }

    fn tool_instructions(&self) -> Option<String> {
        if self.options.tools_enabled {
            self.tools.prompt_instructions()
        } else {
            None
        }
    }

    /// Drive one turn to completion. Issuing a second turn while one is in
    /// flight is the caller's responsibility to prevent.
    pub async fn run_turn(
        &self,
        conversation: &mut Conversation,
        settings: &ChatSettings,
        input: TurnInput,
    ) -> Result<TurnOutcome, PipelineError> {
        let (_guard, token) = self.begin_turn();
        self.set_state(PipelineState::Building);

        let Some(provider) = builtin_providers::get(&settings.provider_id) else {
            return self.fail(PipelineError::UnknownProvider(settings.provider_id.clone()));
        };
        let api_key = match resolve_api_key(self.credentials.as_ref(), provider) {
            Ok(key) => key,
            Err(err) => return self.fail(err.into()),
        };
        let model = provider.model(&settings.model_id);
        if model.is_none() {
            debug!(provider = %provider.id, model = %settings.model_id, "Model not in catalog; sending raw id");
        }

        match input {
            TurnInput::User { text, attachments } => {
                conversation.push(request::user_message(&text, &attachments));
            }
            TurnInput::Retry => {
                let answerable = conversation
                    .history_for_request()
                    .last()
                    .is_some_and(|m| matches!(m.role, Role::User | Role::Tool));
                if !answerable {
                    return self.fail(PipelineError::NothingToRetry);
                }
            }
        }

        let tool_instructions = self.tool_instructions();
        let mut hops = 0;
        loop {
            self.set_state(PipelineState::Building);
            let chat_request =
                request::build_request(conversation, settings, model, tool_instructions.as_deref());
            let message_id = conversation.push(Message::assistant(""));
            debug!(provider = %provider.id, model = %chat_request.model, hop = hops, %message_id, "Starting reply");

            self.set_state(PipelineState::Streaming);
            let params = StreamParams {
                provider: provider.clone(),
                api_key: api_key.clone(),
                request: chat_request,
                cancel_token: token.clone(),
            };
            match self.stream_reply(conversation, &message_id, params, &token).await {
                StreamEnd::Finished => {}
                StreamEnd::Cancelled => return self.cancelled(Some(message_id)),
                StreamEnd::Failed(message) => {
                    conversation.mark_error(&message_id, message.clone());
                    return self.fail(PipelineError::Transport {
                        message_id,
                        message,
                    });
                }
            }

            self.set_state(PipelineState::ParsingTail);
            let text = conversation
                .get(&message_id)
                .map(Message::text)
                .unwrap_or_default();
            let parsed = inline::parse(&text, true);
            let requests = parsed.tool_requests.clone();
            self.emit(PipelineEvent::Parsed {
                message_id: message_id.clone(),
                parsed,
                complete: true,
            });

            if !self.options.tools_enabled || requests.is_empty() {
                return Ok(TurnOutcome::Completed {
                    message_id,
                    hops,
                    pending_tools: Vec::new(),
                });
            }
            if !self.options.auto_run_tools {
                return Ok(TurnOutcome::Completed {
                    message_id,
                    hops,
                    pending_tools: requests,
                });
            }
            if hops >= self.options.max_tool_hops {
                let notice = format!(
                    "Stopped after {hops} automatic tool round(s); {} tool request(s) not run.",
                    requests.len()
                );
                info!(hops, "Tool hop limit reached");
                self.emit(PipelineEvent::Notice(notice));
                return Ok(TurnOutcome::HopLimitReached {
                    message_id,
                    hops,
                    pending_tools: requests,
                });
            }

            let results = match self.run_batch(&requests, &token).await {
                ToolBatch::Ran(results) => results,
                ToolBatch::Dismissed => return Ok(TurnOutcome::HumanCancelled { message_id }),
                ToolBatch::Aborted => return self.cancelled(Some(message_id)),
            };
            for (tool, outcome) in results {
                let tool_message_id = conversation.push(Message::tool_result(tool, outcome.render()));
                self.emit(PipelineEvent::ToolResult {
                    message_id: tool_message_id,
                    outcome,
                });
            }
            hops += 1;
        }
    }

    async fn stream_reply(
        &self,
        conversation: &mut Conversation,
        message_id: &str,
        params: StreamParams,
        token: &CancellationToken,
    ) -> StreamEnd {
        let mut rx = self.transport.open(params);
        let mut failure: Option<String> = None;
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return StreamEnd::Cancelled,
                next = rx.recv() => next,
            };
            match next {
                Some(StreamMessage::Chunk(delta)) => {
                    if !conversation.append_delta(message_id, &delta) {
                        warn!(%message_id, "Streaming message disappeared");
                        continue;
                    }
                    self.emit(PipelineEvent::Delta {
                        message_id: message_id.to_string(),
                        delta,
                    });
                    if let Some(text) = conversation.get(message_id).map(Message::text) {
                        self.emit(PipelineEvent::Parsed {
                            message_id: message_id.to_string(),
                            parsed: inline::parse(&text, false),
                            complete: false,
                        });
                    }
                }
                Some(StreamMessage::Error(message)) => {
                    failure.get_or_insert(message);
                }
                Some(StreamMessage::End) | None => break,
            }
        }
        if token.is_cancelled() {
            return StreamEnd::Cancelled;
        }
        match failure {
            Some(message) => StreamEnd::Failed(message),
            None => StreamEnd::Finished,
        }
    }

    /// Run each request in order, asking the human first where the tool
    /// requires it. Results are only returned once every request is settled,
    /// so a dismissal leaves the conversation untouched.
    async fn run_batch(&self, requests: &[ToolElicitRequest], token: &CancellationToken) -> ToolBatch {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let answer = match self.ask_human(request, token).await {
                HumanStep::Answer(answer) => answer,
                HumanStep::Dismissed => return ToolBatch::Dismissed,
                HumanStep::Aborted => return ToolBatch::Aborted,
            };
            let outcome = tokio::select! {
                biased;
                _ = token.cancelled() => return ToolBatch::Aborted,
                outcome = self.tools.run(request, answer.as_ref()) => outcome,
            };
            debug!(tool = %outcome.tool, status = ?outcome.status, "Tool finished");
            results.push((outcome.tool.clone(), outcome));
        }
        ToolBatch::Ran(results)
    }

    async fn ask_human(&self, request: &ToolElicitRequest, token: &CancellationToken) -> HumanStep {
        let Some(tool) = self.tools.lookup(&request.tool) else {
            return HumanStep::Answer(None);
        };
        if tool.human_input() == HumanInputPolicy::None {
            return HumanStep::Answer(None);
        }
        let Some(question) = tool.human_question(request) else {
            return HumanStep::Answer(None);
        };

        self.set_state(PipelineState::AwaitingHuman);
        let pending = self.broker.request(question.question, question.fields);
        let request_id = pending.id();
        if let Some(handles) = self.lock_turn().as_mut() {
            handles.human_request = Some(request_id);
        }
        debug!(tool = %request.tool, request_id, "Waiting for human input");

        let outcome = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            outcome = pending.wait() => Some(outcome),
        };
        if let Some(handles) = self.lock_turn().as_mut() {
            handles.human_request = None;
        }

        match outcome {
            Some(HumanInputOutcome::Answered(answer)) => HumanStep::Answer(Some(answer)),
            Some(HumanInputOutcome::Cancelled) if token.is_cancelled() => HumanStep::Aborted,
            Some(HumanInputOutcome::Cancelled) => {
                info!(tool = %request.tool, "Human dismissed tool request");
                HumanStep::Dismissed
            }
            None => {
                let _ = self.broker.cancel(request_id);
                HumanStep::Aborted
            }
        }
    }

    /// Run one parsed tool request on the user's say-so and append its result.
    /// Returns `None` when the human dismissed the tool's question.
    pub async fn run_tool(
        &self,
        conversation: &mut Conversation,
        request: &ToolElicitRequest,
    ) -> Option<ToolOutcome> {
        let (_guard, token) = self.begin_turn();
        let outcome = match self.run_batch(std::slice::from_ref(request), &token).await {
            ToolBatch::Ran(mut results) => results.pop().map(|(_, outcome)| outcome)?,
            ToolBatch::Dismissed => return None,
            ToolBatch::Aborted => {
                self.set_state(PipelineState::Cancelled);
                return None;
            }
        };
        let message_id = conversation.push(Message::tool_result(outcome.tool.clone(), outcome.render()));
        self.emit(PipelineEvent::ToolResult {
            message_id,
            outcome: outcome.clone(),
        });
        Some(outcome)
    }
}
