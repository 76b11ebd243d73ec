//! Wire types for OpenAI-compatible chat completion endpoints.

use crate::core::message::{ContentPart, Message, MessageContent};
use crate::core::settings::ModelParameters;
use serde::{Deserialize, Serialize};

pub mod models;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ChatContentPart>),
}

impl From<&MessageContent> for ChatContent {
    fn from(content: &MessageContent) -> Self {
        match content {
            MessageContent::Text(text) => ChatContent::Text(text.clone()),
            MessageContent::Parts(parts) => ChatContent::Parts(
                parts
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text { text } => ChatContentPart::Text { text: text.clone() },
                        ContentPart::Image { url } => ChatContentPart::ImageUrl {
                            image_url: ImageUrl { url: url.clone() },
                        },
                    })
                    .collect(),
            ),
        }
    }
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: ChatContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: ChatContent::Text(text.into()),
        }
    }

    pub fn text(&self) -> String {
        match &self.content {
            ChatContent::Text(text) => text.clone(),
            ChatContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ChatContentPart::Text { text } => Some(text.as_str()),
                    ChatContentPart::ImageUrl { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n\n"),
        }
    }
}

/// Tool results are relabelled as user text naming the tool, since the
/// endpoint has no tool call to attach them to.
impl From<&Message> for ChatMessage {
    fn from(message: &Message) -> Self {
        let content = match (&message.tool_name, &message.content) {
            (Some(tool), MessageContent::Text(text)) => {
                ChatContent::Text(format!("Tool result for `{tool}`:\n{text}"))
            }
            _ => ChatContent::from(&message.content),
        };
        Self {
            role: message.role.to_api_role().to_string(),
            content,
        }
    }
}

#[derive(Serialize, Debug)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub stream: bool,
    #[serde(flatten)]
    pub parameters: ModelParameters,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponseDelta {
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ChatResponseChoice {
    pub delta: ChatResponseDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// One SSE chunk of a streamed completion.
#[derive(Deserialize, Debug)]
pub struct ChatResponse {
    pub choices: Vec<ChatResponseChoice>,
}

#[derive(Deserialize, Debug)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

/// Body of a non-streamed completion.
#[derive(Deserialize, Debug)]
pub struct CompletionResponse {
    pub choices: Vec<CompletionChoice>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct ModelInfo {
    pub id: String,
    pub created: Option<u64>,
    pub created_at: Option<String>,
    pub owned_by: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Deserialize, Debug)]
pub struct ModelsResponse {
    pub data: Vec<ModelInfo>,
}
