use super::{ClientTool, HumanInputPolicy, HumanQuestion, ToolCall, ToolError, ToolId};
use crate::core::human_input::{FieldType, InputField};
use crate::core::inline::ToolElicitRequest;
use crate::utils::calc;
use async_trait::async_trait;
use chrono::{Local, Utc};
use futures_util::{Stream, StreamExt};
use rand::Rng;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const FETCH_TIMEOUT: Duration = Duration::from_secs(20);
const FETCH_MAX_CHARS: usize = 20_000;
/// Enough bytes for `FETCH_MAX_CHARS` characters of any UTF-8 text.
const FETCH_MAX_BYTES: usize = FETCH_MAX_CHARS * 4;

pub struct CurrentTimeTool;

#[async_trait]
impl ClientTool for CurrentTimeTool {
    fn id(&self) -> ToolId {
        ToolId::CurrentTime
    }

    fn description(&self) -> &'static str {
        "Current local date and time, plus UTC. Optional strftime `format`."
    }

    fn params_hint(&self) -> &'static str {
        "{\"format\"?: string}"
    }

    async fn execute(&self, call: ToolCall<'_>) -> Result<String, ToolError> {
        let now = Local::now();
        match call.str_param("format").map(str::trim).filter(|f| !f.is_empty()) {
            Some(format) => {
                let mut rendered = String::new();
                use std::fmt::Write;
                write!(rendered, "{}", now.format(format))
                    .map_err(|_| ToolError::InvalidParams(format!("bad format '{format}'")))?;
                Ok(rendered)
            }
            None => Ok(format!(
                "Local: {}\nUTC: {}",
                now.to_rfc3339(),
                Utc::now().format("%Y-%m-%dT%H:%M:%SZ")
            )),
        }
    }
}

pub struct CalculateTool;

#[async_trait]
impl ClientTool for CalculateTool {
    fn id(&self) -> ToolId {
        ToolId::Calculate
    }

    fn description(&self) -> &'static str {
        "Evaluate an arithmetic expression (+ - * / % ^, parentheses, sqrt, abs, ln, log, sin, cos, tan, round, floor, ceil, pi, e)."
    }

    fn params_hint(&self) -> &'static str {
        "{\"expression\": string}"
    }

    async fn execute(&self, call: ToolCall<'_>) -> Result<String, ToolError> {
        let expression = call
            .str_param("expression")
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidParams("`expression` is required".into()))?;
        calc::evaluate(expression)
            .map(calc::format_number)
            .map_err(|err| ToolError::Failed(err.to_string()))
    }
}

pub struct RandomNumberTool;

#[async_trait]
impl ClientTool for RandomNumberTool {
    fn id(&self) -> ToolId {
        ToolId::RandomNumber
    }

    fn description(&self) -> &'static str {
        "Random integer between `min` and `max` inclusive (defaults 1 and 100)."
    }

    fn params_hint(&self) -> &'static str {
        "{\"min\"?: integer, \"max\"?: integer}"
    }

    async fn execute(&self, call: ToolCall<'_>) -> Result<String, ToolError> {
        let min = call.f64_param("min").unwrap_or(1.0).round() as i64;
        let max = call.f64_param("max").unwrap_or(100.0).round() as i64;
        if min > max {
            return Err(ToolError::InvalidParams(format!(
                "min ({min}) is greater than max ({max})"
            )));
        }
        Ok(rand::thread_rng().gen_range(min..=max).to_string())
    }
}

pub struct UuidTool;

#[async_trait]
impl ClientTool for UuidTool {
    fn id(&self) -> ToolId {
        ToolId::GenerateUuid
    }

    fn description(&self) -> &'static str {
        "Generate a random UUID v4."
    }

    async fn execute(&self, _call: ToolCall<'_>) -> Result<String, ToolError> {
        Ok(uuid::Uuid::new_v4().to_string())
    }
}

/// Puts a question to the person at the keyboard and returns their answer.
pub struct AskUserTool;

impl AskUserTool {
    fn fields(params: &serde_json::Map<String, Value>) -> Vec<InputField> {
        let fields: Vec<InputField> = params
            .get("fields")
            .and_then(|value| serde_json::from_value::<Vec<InputField>>(value.clone()).ok())
            .unwrap_or_default()
            .into_iter()
            .filter(|field| !field.key.trim().is_empty())
            .collect();
        if fields.is_empty() {
            vec![InputField::text("answer", "Answer").required()]
        } else {
            fields
        }
    }
}

#[async_trait]
impl ClientTool for AskUserTool {
    fn id(&self) -> ToolId {
        ToolId::AskUser
    }

    fn description(&self) -> &'static str {
        "Ask the user a question and wait for the answer. Optional `fields` is a list of {key, type (text|select|radio|checkbox), label, options, required}."
    }

    fn params_hint(&self) -> &'static str {
        "{\"question\": string, \"fields\"?: array}"
    }

    fn human_input(&self) -> HumanInputPolicy {
        HumanInputPolicy::Answer
    }

    fn human_question(&self, request: &ToolElicitRequest) -> Option<HumanQuestion> {
        let question = request
            .params
            .get("question")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string)
            .or_else(|| request.reason.clone())
            .unwrap_or_else(|| "The assistant has a question for you.".to_string());
        Some(HumanQuestion {
            question,
            fields: Self::fields(&request.params),
        })
    }

    async fn execute(&self, call: ToolCall<'_>) -> Result<String, ToolError> {
        let answer = call
            .answer
            .ok_or_else(|| ToolError::Failed("no answer was provided".into()))?;
        if answer.len() == 1 {
            if let Some(Value::String(text)) = answer.values().next() {
                return Ok(text.clone());
            }
        }
        serde_json::to_string(answer).map_err(|err| ToolError::Failed(err.to_string()))
    }
}

/// HTTP GET of a URL, gated on the user's approval.
pub struct FetchUrlTool {
    client: reqwest::Client,
}

impl FetchUrlTool {
    pub const DECISION_KEY: &'static str = "decision";
    pub const ALLOW: &'static str = "allow";
    pub const DENY: &'static str = "deny";

    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClientTool for FetchUrlTool {
    fn id(&self) -> ToolId {
        ToolId::FetchUrl
    }

    fn description(&self) -> &'static str {
        "Fetch a web page or API response over HTTP(S) GET. The user must approve each fetch."
    }

    fn params_hint(&self) -> &'static str {
        "{\"url\": string}"
    }

    fn human_input(&self) -> HumanInputPolicy {
        HumanInputPolicy::Confirm
    }

    fn human_question(&self, request: &ToolElicitRequest) -> Option<HumanQuestion> {
        let url = request
            .params
            .get("url")
            .and_then(Value::as_str)
            .unwrap_or("(no url)");
        let mut question = format!("Allow the assistant to fetch {url}?");
        if let Some(reason) = &request.reason {
            question.push_str(&format!("\nReason: {reason}"));
        }
        Some(HumanQuestion {
            question,
            fields: vec![InputField::choice(
                Self::DECISION_KEY,
                "Decision",
                FieldType::Radio,
                vec![Self::ALLOW.to_string(), Self::DENY.to_string()],
            )
            .required()],
        })
    }

    async fn execute(&self, call: ToolCall<'_>) -> Result<String, ToolError> {
        let approved = call
            .answer
            .and_then(|bag| bag.get(Self::DECISION_KEY))
            .and_then(Value::as_str)
            .is_some_and(|decision| decision.eq_ignore_ascii_case(Self::ALLOW));
        if !approved {
            return Err(ToolError::Denied);
        }

        let url = call
            .str_param("url")
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ToolError::InvalidParams("`url` is required".into()))?;
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| ToolError::InvalidParams(format!("invalid url '{url}': {err}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::InvalidParams(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        debug!(%url, "Fetching URL for tool request");
        let response = self
            .client
            .get(parsed)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(|err| ToolError::Failed(format!("request failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Failed(format!("HTTP {status}")));
        }
        let (body, cut) = read_capped(response.bytes_stream(), FETCH_MAX_BYTES)
            .await
            .map_err(|err| ToolError::Failed(format!("failed to read body: {err}")))?;
        Ok(truncate_body(&body, cut))
    }
}

/// Collect at most `limit` bytes from `stream`, stopping early once the cap is
/// hit. The flag reports whether anything was left unread.
async fn read_capped<S, B, E>(stream: S, limit: usize) -> Result<(Vec<u8>, bool), E>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
{
    let mut stream = std::pin::pin!(stream);
    let mut body = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let chunk = chunk.as_ref();
        let room = limit - body.len();
        if chunk.len() > room {
            body.extend_from_slice(&chunk[..room]);
            return Ok((body, true));
        }
        body.extend_from_slice(chunk);
    }
    Ok((body, false))
}

fn truncate_body(body: &[u8], cut: bool) -> String {
    let decoded = String::from_utf8_lossy(body);
    let mut chars = decoded.chars();
    let mut text: String = chars.by_ref().take(FETCH_MAX_CHARS).collect();
    if cut || chars.next().is_some() {
        text.push_str("\n[truncated]");
    }
    text
}
