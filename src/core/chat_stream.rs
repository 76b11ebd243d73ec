use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::api::{ChatRequest, ChatResponse, CompletionResponse};
use crate::core::builtin_providers::Provider;
use crate::utils::auth::add_auth_headers;
use crate::utils::url::construct_api_url;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamMessage {
    Chunk(String),
    Error(String),
    End,
}

pub struct StreamParams {
    pub provider: Provider,
    pub api_key: Option<String>,
    pub request: ChatRequest,
    pub cancel_token: CancellationToken,
}

/// Opens a completion stream. Messages arrive in order and the channel
/// carries at most one `Error`, always followed by `End`, unless the token is
/// cancelled first, in which case the sender is simply dropped.
pub trait ChatTransport: Send + Sync {
    fn open(&self, params: StreamParams) -> mpsc::UnboundedReceiver<StreamMessage>;
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

/// Returns true once the stream is finished.
fn handle_data_payload(payload: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    if payload == "[DONE]" {
        let _ = tx.send(StreamMessage::End);
        return true;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => {
            if let Some(content) = response
                .choices
                .first()
                .and_then(|choice| choice.delta.content.as_ref())
                .filter(|content| !content.is_empty())
            {
                let _ = tx.send(StreamMessage::Chunk(content.clone()));
            }
            false
        }
        Err(_) => {
            if payload.trim().is_empty() {
                return false;
            }
            let _ = tx.send(StreamMessage::Error(format_api_error(payload)));
            let _ = tx.send(StreamMessage::End);
            true
        }
    }
}

fn process_sse_line(line: &str, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    extract_data_payload(line)
        .map(|payload| handle_data_payload(payload, tx))
        .unwrap_or(false)
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    let summary = value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .map(str::to_owned)
        .or_else(|| {
            value
                .get("error")
                .and_then(|v| v.as_str())
                .map(str::to_owned)
        })
        .or_else(|| {
            value
                .get("message")
                .and_then(|v| v.as_str().map(str::to_owned))
        });

    summary.map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
}

/// Render an error body for display: JSON is pretty-printed with its message
/// pulled into the heading, XML and plain text are fenced as-is.
pub fn format_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();

    if trimmed.is_empty() {
        return "API Error:\n```\n<empty>\n```".to_string();
    }

    if let Ok(json_value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Ok(pretty_json) = serde_json::to_string_pretty(&json_value) {
            return match extract_error_summary(&json_value).filter(|s| !s.is_empty()) {
                Some(summary) => format!("API Error: {summary}\n```json\n{pretty_json}\n```"),
                None => format!("API Error:\n```json\n{pretty_json}\n```"),
            };
        }
    }

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        format!("API Error:\n```xml\n{trimmed}\n```")
    } else {
        format!("API Error:\n```\n{trimmed}\n```")
    }
}

/// Split buffered bytes into complete lines and feed them to the SSE parser.
/// Returns true once the stream is finished.
fn drain_lines(buffer: &mut Vec<u8>, tx: &mpsc::UnboundedSender<StreamMessage>) -> bool {
    while let Some(newline_pos) = memchr(b'\n', buffer) {
        let finished = match std::str::from_utf8(&buffer[..newline_pos]) {
            Ok(line) => process_sse_line(line.trim(), tx),
            Err(err) => {
                warn!(error = %err, "Invalid UTF-8 in stream line");
                false
            }
        };
        buffer.drain(..=newline_pos);
        if finished {
            return true;
        }
    }
    false
}

/// `reqwest` transport for OpenAI-compatible `chat/completions` endpoints.
#[derive(Clone, Default)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn run(client: reqwest::Client, params: StreamParams, tx: mpsc::UnboundedSender<StreamMessage>) {
        let StreamParams {
            provider,
            api_key,
            request,
            cancel_token: _,
        } = params;

        let chat_url = construct_api_url(&provider.base_url, "chat/completions");
        debug!(provider = %provider.id, model = %request.model, stream = request.stream, "Opening completion request");
        let http_request = add_auth_headers(
            client.post(chat_url).header("Content-Type", "application/json"),
            &provider,
            api_key.as_deref(),
        );

        let response = match http_request.json(&request).send().await {
            Ok(response) => response,
            Err(err) => {
                let _ = tx.send(StreamMessage::Error(format_api_error(&err.to_string())));
                let _ = tx.send(StreamMessage::End);
                return;
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "<no body>".to_string());
            debug!(%status, "Completion request failed");
            let _ = tx.send(StreamMessage::Error(format_api_error(&error_text)));
            let _ = tx.send(StreamMessage::End);
            return;
        }

        if !request.stream {
            match response.json::<CompletionResponse>().await {
                Ok(body) => {
                    if let Some(content) = body
                        .choices
                        .into_iter()
                        .next()
                        .and_then(|choice| choice.message.content)
                    {
                        let _ = tx.send(StreamMessage::Chunk(content));
                    }
                }
                Err(err) => {
                    let _ = tx.send(StreamMessage::Error(format!("Malformed response: {err}")));
                }
            }
            let _ = tx.send(StreamMessage::End);
            return;
        }

        let mut stream = response.bytes_stream();
        let mut buffer: Vec<u8> = Vec::new();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => {
                    buffer.extend_from_slice(&bytes);
                    if drain_lines(&mut buffer, &tx) {
                        return;
                    }
                }
                Err(err) => {
                    let _ = tx.send(StreamMessage::Error(format!("Stream interrupted: {err}")));
                    let _ = tx.send(StreamMessage::End);
                    return;
                }
            }
        }

        // A final line without a trailing newline.
        if !buffer.is_empty() {
            buffer.push(b'\n');
            if drain_lines(&mut buffer, &tx) {
                return;
            }
        }
        let _ = tx.send(StreamMessage::End);
    }
}

impl ChatTransport for HttpTransport {
    fn open(&self, params: StreamParams) -> mpsc::UnboundedReceiver<StreamMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        let client = self.client.clone();
        let cancel_token = params.cancel_token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = Self::run(client, params, tx) => {}
                _ = cancel_token.cancelled() => {
                    debug!("Completion stream cancelled");
                }
            }
        });
        rx
    }
}
