//! Client-side tools the model can ask for through `tool_elicit` blocks.
//!
//! Tools are addressed by [`ToolId`]; a name that does not map to a known id
//! resolves to [`ToolLookup::Unknown`] and is never executed. Failures never
//! escape [`ToolRegistry::run`]: they come back as a rendered [`ToolOutcome`].

mod builtin;

pub use builtin::{AskUserTool, CalculateTool, CurrentTimeTool, FetchUrlTool, RandomNumberTool, UuidTool};

use crate::core::human_input::{AnswerBag, InputField};
use crate::core::inline::ToolElicitRequest;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolId {
    CurrentTime,
    Calculate,
    RandomNumber,
    GenerateUuid,
    AskUser,
    FetchUrl,
}

impl ToolId {
    pub const ALL: [ToolId; 6] = [
        ToolId::CurrentTime,
        ToolId::Calculate,
        ToolId::RandomNumber,
        ToolId::GenerateUuid,
        ToolId::AskUser,
        ToolId::FetchUrl,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ToolId::CurrentTime => "current_time",
            ToolId::Calculate => "calculate",
            ToolId::RandomNumber => "random_number",
            ToolId::GenerateUuid => "generate_uuid",
            ToolId::AskUser => "ask_user",
            ToolId::FetchUrl => "fetch_url",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolLookup {
    Known(ToolId),
    Unknown(String),
}

impl ToolLookup {
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim();
        ToolId::ALL
            .into_iter()
            .find(|id| id.name().eq_ignore_ascii_case(normalized))
            .map(ToolLookup::Known)
            .unwrap_or_else(|| ToolLookup::Unknown(normalized.to_string()))
    }
}

/// Whether a tool needs a person before (or instead of) running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HumanInputPolicy {
    #[default]
    None,
    /// Ask for approval, then run.
    Confirm,
    /// The answer itself is the tool's input.
    Answer,
}

/// A question to put to the human before running a tool.
#[derive(Debug, Clone, PartialEq)]
pub struct HumanQuestion {
    pub question: String,
    pub fields: Vec<InputField>,
}

pub struct ToolCall<'a> {
    pub params: &'a Map<String, Value>,
    /// Present for tools with a non-`None` human input policy.
    pub answer: Option<&'a AnswerBag>,
}

impl ToolCall<'_> {
    pub fn str_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn f64_param(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ToolError {
    InvalidParams(String),
    Denied,
    Failed(String),
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolError::InvalidParams(msg) => write!(f, "invalid parameters: {msg}"),
            ToolError::Denied => write!(f, "denied by user"),
            ToolError::Failed(msg) => write!(f, "{msg}"),
        }
    }
}

impl Error for ToolError {}

#[async_trait]
pub trait ClientTool: Send + Sync {
    fn id(&self) -> ToolId;

    fn description(&self) -> &'static str;

    /// Short parameter synopsis shown to the model.
    fn params_hint(&self) -> &'static str {
        "{}"
    }

    fn human_input(&self) -> HumanInputPolicy {
        HumanInputPolicy::None
    }

    /// Question to ask before running. Only consulted when the policy is not
    /// `None`.
    fn human_question(&self, _request: &ToolElicitRequest) -> Option<HumanQuestion> {
        None
    }

    async fn execute(&self, call: ToolCall<'_>) -> Result<String, ToolError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Success,
    Failed,
    Denied,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolOutcome {
    pub tool: String,
    pub status: ToolStatus,
    pub output: String,
}

impl ToolOutcome {
    fn unknown(name: &str) -> Self {
        Self {
            tool: name.to_string(),
            status: ToolStatus::Unknown,
            output: format!("Error: unknown tool '{name}'"),
        }
    }

    /// Text folded back into the conversation for the model.
    pub fn render(&self) -> String {
        match self.status {
            ToolStatus::Success => self.output.clone(),
            ToolStatus::Failed | ToolStatus::Unknown => self.output.clone(),
            ToolStatus::Denied => format!("Tool '{}' was denied by the user.", self.tool),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<ToolId, Box<dyn ClientTool>>,
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in tool.
    pub fn with_builtins(http: reqwest::Client) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(CurrentTimeTool));
        registry.register(Box::new(CalculateTool));
        registry.register(Box::new(RandomNumberTool));
        registry.register(Box::new(UuidTool));
        registry.register(Box::new(AskUserTool));
        registry.register(Box::new(FetchUrlTool::new(http)));
        registry
    }

    pub fn register(&mut self, tool: Box<dyn ClientTool>) {
        self.tools.insert(tool.id(), tool);
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn lookup(&self, name: &str) -> Option<&dyn ClientTool> {
        match ToolLookup::parse(name) {
            ToolLookup::Known(id) => self.tools.get(&id).map(|tool| tool.as_ref()),
            ToolLookup::Unknown(_) => None,
        }
    }

    pub fn human_input_policy(&self, name: &str) -> Option<HumanInputPolicy> {
        self.lookup(name).map(|tool| tool.human_input())
    }

    /// Run a parsed request. Unregistered names are reported without calling
    /// anything; tool failures are rendered into the outcome.
    pub async fn run(&self, request: &ToolElicitRequest, answer: Option<&AnswerBag>) -> ToolOutcome {
        let Some(tool) = self.lookup(&request.tool) else {
            debug!(tool = %request.tool, "Tool request for unknown tool");
            return ToolOutcome::unknown(&request.tool);
        };
        let name = tool.id().name().to_string();

        let call = ToolCall {
            params: &request.params,
            answer,
        };
        match tool.execute(call).await {
            Ok(output) => ToolOutcome {
                tool: name,
                status: ToolStatus::Success,
                output,
            },
            Err(ToolError::Denied) => ToolOutcome {
                tool: name,
                status: ToolStatus::Denied,
                output: String::new(),
            },
            Err(err) => {
                warn!(tool = %name, error = %err, "Tool execution failed");
                ToolOutcome {
                    tool: name,
                    status: ToolStatus::Failed,
                    output: format!("Error: {err}"),
                }
            }
        }
    }

    /// Instructions appended to the system prompt describing the registered
    /// tools and the `tool_elicit` block format.
    pub fn prompt_instructions(&self) -> Option<String> {
        if self.tools.is_empty() {
            return None;
        }
        let mut text = String::from(
            "You can ask the client to run local tools. To call one, reply with a fenced block \
             whose language is `tool_elicit` containing a JSON object with a `tool` name, \
             optional `params` object and optional `reason`, then stop and wait for the result.\n\n\
             ```tool_elicit\n{\"tool\": \"calculate\", \"params\": {\"expression\": \"2 * 21\"}, \"reason\": \"check the math\"}\n```\n\n\
             Available tools:\n",
        );
        for tool in self.tools.values() {
            text.push_str(&format!(
                "- `{}` {}: {}\n",
                tool.id().name(),
                tool.params_hint(),
                tool.description()
            ));
        }
        Some(text)
    }
}
