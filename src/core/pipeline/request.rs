use crate::api::{ChatMessage, ChatRequest};
use crate::core::attachments::AttachedFile;
use crate::core::builtin_providers::Model;
use crate::core::conversation::Conversation;
use crate::core::message::{ContentPart, Message, MessageContent, Role};
use crate::core::settings::ChatSettings;

/// User message for a turn. Attachments become extra parts after the text;
/// kinds that cannot be inlined are described by a placeholder part.
pub(crate) fn user_message(text: &str, attachments: &[AttachedFile]) -> Message {
    if attachments.is_empty() {
        return Message::user(text);
    }
    let mut parts = Vec::with_capacity(attachments.len() + 1);
    if !text.trim().is_empty() {
        parts.push(ContentPart::Text {
            text: text.to_string(),
        });
    }
    parts.extend(attachments.iter().map(AttachedFile::to_content_part));
    Message::new(Role::User, MessageContent::Parts(parts))
}

/// System prompt for the request, or `None` when the model cannot take one.
fn system_prompt(
    settings: &ChatSettings,
    model: Option<&Model>,
    tool_instructions: Option<&str>,
) -> Option<String> {
    if model.is_some_and(|m| !m.supports_system_prompt()) {
        return None;
    }
    let sections: Vec<&str> = settings
        .effective_system_prompt()
        .into_iter()
        .chain(tool_instructions)
        .collect();
    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

/// Assemble the outgoing request from replayable history. An unknown model
/// is sent under its raw id with no exclusions applied.
pub(crate) fn build_request(
    conversation: &Conversation,
    settings: &ChatSettings,
    model: Option<&Model>,
    tool_instructions: Option<&str>,
) -> ChatRequest {
    let mut messages = Vec::with_capacity(conversation.len() + 1);
    if let Some(prompt) = system_prompt(settings, model, tool_instructions) {
        messages.push(ChatMessage::system(prompt));
    }
    messages.extend(conversation.history_for_request().map(ChatMessage::from));

    ChatRequest {
        model: model
            .map(|m| m.id.clone())
            .unwrap_or_else(|| settings.model_id.clone()),
        messages,
        stream: model.is_none_or(Model::supports_streaming),
        parameters: settings.parameters.clone(),
    }
}
