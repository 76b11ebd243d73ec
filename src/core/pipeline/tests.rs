use super::*;
use crate::core::credentials::MemoryCredentialStore;
use crate::core::human_input::HumanInputPrompt;
use crate::core::tools::ToolStatus;
use serde_json::{json, Value};
use std::collections::VecDeque;
use tokio::sync::mpsc;

#[derive(Clone)]
enum Step {
    Chunk(&'static str),
    Error(&'static str),
    /// Keep the stream open until the turn is cancelled.
    Hang,
}

/// Replays canned replies in order and records every request it was given.
#[derive(Default)]
struct ScriptedTransport {
    replies: Mutex<VecDeque<Vec<Step>>>,
    requests: Mutex<Vec<Value>>,
}

impl ScriptedTransport {
    fn new(replies: Vec<Vec<Step>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<Value> {
        self.requests.lock().unwrap().clone()
    }
}

impl ChatTransport for ScriptedTransport {
    fn open(&self, params: StreamParams) -> mpsc::UnboundedReceiver<StreamMessage> {
        self.requests
            .lock()
            .unwrap()
            .push(serde_json::to_value(&params.request).unwrap());
        let steps = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .expect("transport opened more times than scripted");
        let (tx, rx) = mpsc::unbounded_channel();
        let token = params.cancel_token;
        tokio::spawn(async move {
            for step in steps {
                match step {
                    Step::Chunk(text) => {
                        let _ = tx.send(StreamMessage::Chunk(text.to_string()));
                    }
                    Step::Error(text) => {
                        let _ = tx.send(StreamMessage::Error(text.to_string()));
                        let _ = tx.send(StreamMessage::End);
                        return;
                    }
                    Step::Hang => {
                        token.cancelled().await;
                        return;
                    }
                }
            }
            let _ = tx.send(StreamMessage::End);
        });
        rx
    }
}

fn pipeline_with(transport: Arc<ScriptedTransport>, options: PipelineOptions) -> Arc<SessionPipeline> {
    Arc::new(SessionPipeline::new(
        transport,
        Arc::new(MemoryCredentialStore::new()),
        Arc::new(ToolRegistry::with_builtins(reqwest::Client::new())),
        HumanInputBroker::new(),
        options,
    ))
}

fn pipeline(transport: Arc<ScriptedTransport>) -> Arc<SessionPipeline> {
    pipeline_with(transport, PipelineOptions::default())
}

fn settings() -> ChatSettings {
    ChatSettings::new("ollama", "llama3.2")
}

const CALC_BLOCK: &str = "Let me check.\n```tool_elicit\n{\"tool\": \"calculate\", \"params\": {\"expression\": \"6 * 7\"}}\n```\n";
const ASK_BLOCK: &str = "```tool_elicit\n{\"tool\": \"ask_user\", \"params\": {\"question\": \"Favourite colour?\"}}\n```";

fn texts(conversation: &Conversation) -> Vec<(Role, String)> {
    conversation
        .messages()
        .iter()
        .map(|m| (m.role, m.text()))
        .collect()
}

async fn next_prompt(broker: &HumanInputBroker) -> HumanInputPrompt {
    let mut rx = broker.subscribe();
    let prompt = rx.wait_for(Option::is_some).await.unwrap().clone().unwrap();
    prompt
}

#[tokio::test]
async fn plain_reply_streams_into_one_message() {
    let transport = ScriptedTransport::new(vec![vec![
        Step::Chunk("Before <thin"),
        Step::Chunk("king>step one</thinking> After"),
    ]]);
    let pipeline = pipeline(transport.clone());
    let mut events = pipeline.subscribe();
    let mut conversation = Conversation::new("t");

    let outcome = pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::text("hello"))
        .await
        .unwrap();

    let reply = conversation.last().unwrap();
    assert_eq!(reply.text(), "Before <thinking>step one</thinking> After");
    assert_eq!(
        outcome,
        TurnOutcome::Completed {
            message_id: reply.id.clone(),
            hops: 0,
            pending_tools: vec![],
        }
    );
    assert_eq!(pipeline.state(), PipelineState::Idle);

    let mut deltas = Vec::new();
    let mut final_parse = None;
    while let Ok(event) = events.try_recv() {
        match event {
            PipelineEvent::Delta { delta, .. } => deltas.push(delta),
            PipelineEvent::Parsed { parsed, complete: true, .. } => final_parse = Some(parsed),
            _ => {}
        }
    }
    assert_eq!(deltas, ["Before <thin", "king>step one</thinking> After"]);
    let segments: Vec<_> = final_parse.unwrap().segments.iter().map(|s| s.text().to_string()).collect();
    assert_eq!(segments, ["Before", "step one", "After"]);
}

#[tokio::test]
async fn states_progress_and_return_to_idle() {
    let transport = ScriptedTransport::new(vec![vec![Step::Chunk("ok")]]);
    let pipeline = pipeline(transport);
    let mut events = pipeline.subscribe();
    let mut conversation = Conversation::new("t");

    pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::text("hi"))
        .await
        .unwrap();

    let mut states = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let PipelineEvent::StateChanged(state) = event {
            states.push(state);
        }
    }
    assert_eq!(
        states,
        [
            PipelineState::Building,
            PipelineState::Streaming,
            PipelineState::ParsingTail,
            PipelineState::Idle
        ]
    );
}

#[tokio::test]
async fn cancel_mid_stream_keeps_received_text() {
    let transport = ScriptedTransport::new(vec![vec![
        Step::Chunk("Hel"),
        Step::Chunk("lo"),
        Step::Hang,
    ]]);
    let pipeline = pipeline(transport);
    let mut events = pipeline.subscribe();

    let runner = pipeline.clone();
    let task = tokio::spawn(async move {
        let mut conversation = Conversation::new("t");
        let outcome = runner
            .run_turn(&mut conversation, &settings(), TurnInput::text("hi"))
            .await;
        (conversation, outcome)
    });

    loop {
        if let PipelineEvent::Delta { delta, .. } = events.recv().await.unwrap() {
            if delta == "lo" {
                break;
            }
        }
    }
    assert!(pipeline.cancel());

    let (conversation, outcome) = task.await.unwrap();
    let reply = conversation.last().unwrap();
    assert_eq!(reply.text(), "Hello");
    assert!(reply.error.is_none());
    assert_eq!(
        outcome.unwrap(),
        TurnOutcome::Cancelled {
            message_id: Some(reply.id.clone())
        }
    );
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(!pipeline.cancel());
}

#[tokio::test]
async fn tool_results_trigger_a_follow_up_turn() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::Chunk(CALC_BLOCK)],
        vec![Step::Chunk("It is 42.")],
    ]);
    let pipeline = pipeline(transport.clone());
    let mut conversation = Conversation::new("t");

    let outcome = pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::text("what is 6*7?"))
        .await
        .unwrap();

    assert!(matches!(outcome, TurnOutcome::Completed { hops: 1, .. }));
    assert_eq!(
        texts(&conversation),
        vec![
            (Role::User, "what is 6*7?".to_string()),
            (Role::Assistant, CALC_BLOCK.to_string()),
            (Role::Tool, "42".to_string()),
            (Role::Assistant, "It is 42.".to_string()),
        ]
    );

    let requests = transport.requests();
    assert_eq!(requests.len(), 2);
    let follow_up = requests[1]["messages"].as_array().unwrap();
    let last = follow_up.last().unwrap();
    assert_eq!(last["role"], "user");
    assert_eq!(last["content"], "Tool result for `calculate`:\n42");
    assert!(requests[0]["messages"][0]["content"]
        .as_str()
        .unwrap()
        .contains("tool_elicit"));
}

#[tokio::test]
async fn hop_limit_stops_the_loop_without_running_tools() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::Chunk(CALC_BLOCK)],
        vec![Step::Chunk(CALC_BLOCK)],
        vec![Step::Chunk(CALC_BLOCK)],
    ]);
    let options = PipelineOptions {
        max_tool_hops: 2,
        ..Default::default()
    };
    let pipeline = pipeline_with(transport.clone(), options);
    let mut conversation = Conversation::new("t");

    let outcome = pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::text("loop"))
        .await
        .unwrap();

    match outcome {
        TurnOutcome::HopLimitReached { hops, pending_tools, .. } => {
            assert_eq!(hops, 2);
            assert_eq!(pending_tools.len(), 1);
        }
        other => panic!("expected hop limit, got {other:?}"),
    }
    assert_eq!(transport.requests().len(), 3);
    let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [
            Role::User,
            Role::Assistant,
            Role::Tool,
            Role::Assistant,
            Role::Tool,
            Role::Assistant
        ]
    );
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn unknown_tool_is_reported_back_to_the_model() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::Chunk("```tool_elicit\n{\"tool\": \"launch_rocket\"}\n```")],
        vec![Step::Chunk("Sorry, I cannot do that.")],
    ]);
    let pipeline = pipeline(transport);
    let mut events = pipeline.subscribe();
    let mut conversation = Conversation::new("t");

    pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::text("go"))
        .await
        .unwrap();

    let tool_message = &conversation.messages()[2];
    assert_eq!(tool_message.role, Role::Tool);
    assert_eq!(tool_message.tool_name.as_deref(), Some("launch_rocket"));
    assert_eq!(tool_message.text(), "Error: unknown tool 'launch_rocket'");

    let statuses: Vec<ToolStatus> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|event| match event {
            PipelineEvent::ToolResult { outcome, .. } => Some(outcome.status),
            _ => None,
        })
        .collect();
    assert_eq!(statuses, [ToolStatus::Unknown]);
}

#[tokio::test]
async fn human_answer_resumes_the_turn() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::Chunk(ASK_BLOCK)],
        vec![Step::Chunk("Blue it is.")],
    ]);
    let pipeline = pipeline(transport.clone());
    let broker = pipeline.broker().clone();

    let runner = pipeline.clone();
    let task = tokio::spawn(async move {
        let mut conversation = Conversation::new("t");
        let outcome = runner
            .run_turn(&mut conversation, &settings(), TurnInput::text("ask me"))
            .await;
        (conversation, outcome)
    });

    let prompt = next_prompt(&broker).await;
    assert_eq!(prompt.question, "Favourite colour?");
    assert_eq!(pipeline.state(), PipelineState::AwaitingHuman);
    let mut answer = AnswerBag::new();
    answer.insert("answer".into(), json!("blue"));
    broker.resolve(prompt.id, answer).unwrap();

    let (conversation, outcome) = task.await.unwrap();
    assert!(matches!(outcome.unwrap(), TurnOutcome::Completed { hops: 1, .. }));
    assert_eq!(conversation.messages()[2].text(), "blue");
    assert_eq!(conversation.last().unwrap().text(), "Blue it is.");
    assert_eq!(transport.requests().len(), 2);
}

#[tokio::test]
async fn dismissing_the_question_leaves_the_conversation_as_it_was() {
    let transport = ScriptedTransport::new(vec![vec![Step::Chunk(ASK_BLOCK)]]);
    let pipeline = pipeline(transport.clone());
    let broker = pipeline.broker().clone();

    let runner = pipeline.clone();
    let task = tokio::spawn(async move {
        let mut conversation = Conversation::new("t");
        let outcome = runner
            .run_turn(&mut conversation, &settings(), TurnInput::text("ask me"))
            .await;
        (conversation, outcome)
    });

    let prompt = next_prompt(&broker).await;
    broker.cancel(prompt.id).unwrap();

    let (conversation, outcome) = task.await.unwrap();
    let reply = conversation.last().unwrap();
    assert_eq!(
        outcome.unwrap(),
        TurnOutcome::HumanCancelled {
            message_id: reply.id.clone()
        }
    );
    assert_eq!(
        texts(&conversation),
        vec![
            (Role::User, "ask me".to_string()),
            (Role::Assistant, ASK_BLOCK.to_string())
        ]
    );
    assert_eq!(transport.requests().len(), 1);
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn cancelling_while_awaiting_human_releases_the_request() {
    let transport = ScriptedTransport::new(vec![vec![Step::Chunk(ASK_BLOCK)]]);
    let pipeline = pipeline(transport);
    let broker = pipeline.broker().clone();

    let runner = pipeline.clone();
    let task = tokio::spawn(async move {
        let mut conversation = Conversation::new("t");
        runner
            .run_turn(&mut conversation, &settings(), TurnInput::text("ask me"))
            .await
    });

    next_prompt(&broker).await;
    assert!(pipeline.cancel());

    assert!(matches!(task.await.unwrap().unwrap(), TurnOutcome::Cancelled { .. }));
    assert!(broker.current().is_none());
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn transport_error_keeps_partial_text_and_allows_retry() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::Chunk("partial"), Step::Error("API Error: overloaded")],
        vec![Step::Chunk("fine now")],
    ]);
    let pipeline = pipeline(transport.clone());
    let mut conversation = Conversation::new("t");

    let err = pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::text("hi"))
        .await
        .unwrap_err();
    let failed_id = match &err {
        PipelineError::Transport { message_id, message } => {
            assert_eq!(message, "API Error: overloaded");
            message_id.clone()
        }
        other => panic!("expected transport error, got {other:?}"),
    };
    let failed = conversation.get(&failed_id).unwrap();
    assert_eq!(failed.text(), "partial");
    assert_eq!(failed.error.as_deref(), Some("API Error: overloaded"));
    assert_eq!(pipeline.state(), PipelineState::Idle);

    let outcome = pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::Retry)
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Completed { .. }));
    assert_eq!(conversation.len(), 3);

    let retry = &transport.requests()[1];
    let replayed: Vec<&str> = retry["messages"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|m| m["role"] != "system")
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(replayed, ["hi"]);
}

#[tokio::test]
async fn retry_without_anything_to_answer_is_rejected() {
    let pipeline = pipeline(ScriptedTransport::new(vec![]));
    let mut conversation = Conversation::new("t");
    let err = pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::Retry)
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NothingToRetry));
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn unknown_provider_fails_before_touching_the_conversation() {
    let pipeline = pipeline(ScriptedTransport::new(vec![]));
    let mut conversation = Conversation::new("t");
    let err = pipeline
        .run_turn(
            &mut conversation,
            &ChatSettings::new("retired-co", "m"),
            TurnInput::text("hi"),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnknownProvider(ref id) if id == "retired-co"));
    assert!(conversation.is_empty());
    assert_eq!(pipeline.state(), PipelineState::Idle);
}

#[tokio::test]
async fn missing_credentials_are_reported() {
    if std::env::var("MISTRAL_API_KEY").is_ok() {
        return;
    }
    let pipeline = pipeline(ScriptedTransport::new(vec![]));
    let mut conversation = Conversation::new("t");
    let settings = ChatSettings::new("mistral", "mistral-large-latest");
    let err = pipeline
        .run_turn(&mut conversation, &settings, TurnInput::text("hi"))
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::Credentials(_)));
    assert!(conversation.is_empty());
}

#[tokio::test]
async fn manual_mode_returns_pending_tools_and_run_tool_executes_them() {
    let transport = ScriptedTransport::new(vec![
        vec![Step::Chunk(CALC_BLOCK)],
        vec![Step::Chunk("Thanks.")],
    ]);
    let options = PipelineOptions {
        auto_run_tools: false,
        ..Default::default()
    };
    let pipeline = pipeline_with(transport.clone(), options);
    let mut conversation = Conversation::new("t");

    let outcome = pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::text("calc"))
        .await
        .unwrap();
    let pending = match outcome {
        TurnOutcome::Completed { pending_tools, .. } => pending_tools,
        other => panic!("expected completion, got {other:?}"),
    };
    assert_eq!(pending.len(), 1);
    assert_eq!(conversation.len(), 2);

    let result = pipeline.run_tool(&mut conversation, &pending[0]).await.unwrap();
    assert_eq!(result.output, "42");
    // Running it again is an explicit action and simply runs again.
    pipeline.run_tool(&mut conversation, &pending[0]).await.unwrap();
    assert_eq!(conversation.len(), 4);

    pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::Retry)
        .await
        .unwrap();
    assert_eq!(conversation.last().unwrap().text(), "Thanks.");
}

#[tokio::test]
async fn disabled_tools_are_neither_described_nor_run() {
    let transport = ScriptedTransport::new(vec![vec![Step::Chunk(CALC_BLOCK)]]);
    let options = PipelineOptions {
        tools_enabled: false,
        ..Default::default()
    };
    let pipeline = pipeline_with(transport.clone(), options);
    let mut conversation = Conversation::new("t");

    let outcome = pipeline
        .run_turn(&mut conversation, &settings(), TurnInput::text("calc"))
        .await
        .unwrap();
    assert!(matches!(outcome, TurnOutcome::Completed { hops: 0, ref pending_tools, .. } if pending_tools.is_empty()));
    assert_eq!(conversation.len(), 2);
    assert_eq!(transport.requests()[0]["messages"][0]["role"], "user");
}
