//! Conversation transcript and starred-message bookkeeping.

use crate::core::message::{Message, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// An ordered transcript. Insertion order is conversation order and is what
/// gets replayed to the provider, so messages are only ever appended. The one
/// exception is the in-flight assistant message, whose content grows while its
/// stream is open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub title: String,
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            messages: Vec::new(),
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    pub fn get(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    /// Append a message and return its id.
    pub fn push(&mut self, message: Message) -> String {
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    pub(crate) fn get_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Append streamed text to an assistant message. Returns false when the
    /// message no longer exists.
    pub(crate) fn append_delta(&mut self, message_id: &str, delta: &str) -> bool {
        match self.get_mut(message_id) {
            Some(message) => {
                message.append_delta(delta);
                true
            }
            None => false,
        }
    }

    pub(crate) fn mark_error(&mut self, message_id: &str, error: impl Into<String>) {
        if let Some(message) = self.get_mut(message_id) {
            message.error = Some(error.into());
        }
    }

    /// Messages that should be replayed to the provider. Failed or empty
    /// assistant replies are skipped so a retry starts from clean history.
    pub fn history_for_request(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| {
            !(m.role == Role::Assistant && (m.is_errored() || m.content.is_empty()))
        })
    }

    /// Title derived from the first user message, truncated to `max_chars`.
    pub fn suggested_title(&self, max_chars: usize) -> Option<String> {
        let first = self.messages.iter().find(|m| m.role == Role::User)?;
        let text = first.text();
        let line = text.lines().find(|l| !l.trim().is_empty())?.trim();
        if line.chars().count() <= max_chars {
            Some(line.to_string())
        } else {
            let truncated: String = line.chars().take(max_chars).collect();
            Some(format!("{}…", truncated.trim_end()))
        }
    }
}

/// Starred message ids per conversation. Entries are not tied to message
/// lifetimes; readers filter out ids that no longer resolve.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct StarredSet {
    entries: BTreeMap<String, BTreeSet<String>>,
}

impl StarredSet {
    /// Toggle a star and return the new state.
    pub fn toggle(&mut self, conversation_id: &str, message_id: &str) -> bool {
        let set = self.entries.entry(conversation_id.to_string()).or_default();
        let starred = if set.remove(message_id) {
            false
        } else {
            set.insert(message_id.to_string());
            true
        };
        if set.is_empty() {
            self.entries.remove(conversation_id);
        }
        starred
    }

    pub fn is_starred(&self, conversation_id: &str, message_id: &str) -> bool {
        self.entries
            .get(conversation_id)
            .is_some_and(|set| set.contains(message_id))
    }

    /// Starred messages that still exist in the conversation, in transcript order.
    pub fn starred_in<'a>(&self, conversation: &'a Conversation) -> Vec<&'a Message> {
        let Some(ids) = self.entries.get(&conversation.id) else {
            return Vec::new();
        };
        conversation
            .messages()
            .iter()
            .filter(|m| ids.contains(&m.id))
            .collect()
    }
}
