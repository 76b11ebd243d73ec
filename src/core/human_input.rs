//! Single-slot broker for questions that need a human answer.
//!
//! At most one request is outstanding at a time. Issuing a new request evicts
//! the current one: its waiter is told it was cancelled before the new request
//! becomes visible to subscribers. There is no queue and no timeout.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{oneshot, watch};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    Text,
    Select,
    Radio,
    Checkbox,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputField {
    pub key: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

impl InputField {
    pub fn text(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            field_type: FieldType::Text,
            label: label.into(),
            options: Vec::new(),
            required: false,
            placeholder: None,
        }
    }

    pub fn choice(
        key: impl Into<String>,
        label: impl Into<String>,
        field_type: FieldType,
        options: Vec<String>,
    ) -> Self {
        Self {
            key: key.into(),
            field_type,
            label: label.into(),
            options,
            required: false,
            placeholder: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }
}

/// Field values keyed by `InputField::key`. Checkbox fields hold an array.
pub type AnswerBag = Map<String, Value>;

/// The observable part of an outstanding request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HumanInputPrompt {
    pub id: u64,
    pub question: String,
    pub fields: Vec<InputField>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HumanInputOutcome {
    Answered(AnswerBag),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanInputError {
    /// The id does not name the outstanding request; it was already resolved,
    /// cancelled or evicted.
    NotPending(u64),
}

impl fmt::Display for HumanInputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HumanInputError::NotPending(id) => {
                write!(f, "Human input request {id} is no longer pending")
            }
        }
    }
}

impl Error for HumanInputError {}

struct Slot {
    prompt: HumanInputPrompt,
    responder: oneshot::Sender<HumanInputOutcome>,
}

struct BrokerInner {
    slot: Mutex<Option<Slot>>,
    current: watch::Sender<Option<HumanInputPrompt>>,
    next_id: AtomicU64,
}

/// Cloneable handle; every clone refers to the same slot.
#[derive(Clone)]
pub struct HumanInputBroker {
    inner: Arc<BrokerInner>,
}

impl Default for HumanInputBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HumanInputBroker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HumanInputBroker")
            .field("current", &*self.inner.current.borrow())
            .finish()
    }
}

/// Waiting side of a request.
#[must_use = "dropping the pending request discards the human's answer"]
pub struct PendingHumanInput {
    id: u64,
    receiver: oneshot::Receiver<HumanInputOutcome>,
}

impl PendingHumanInput {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Suspend until the request is resolved or cancelled. A broker that goes
    /// away without answering counts as a cancellation.
    pub async fn wait(self) -> HumanInputOutcome {
        self.receiver.await.unwrap_or(HumanInputOutcome::Cancelled)
    }

    /// Non-blocking check, for callers that poll from a UI tick.
    pub fn try_outcome(&mut self) -> Option<HumanInputOutcome> {
        match self.receiver.try_recv() {
            Ok(outcome) => Some(outcome),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(HumanInputOutcome::Cancelled),
        }
    }
}

impl HumanInputBroker {
    pub fn new() -> Self {
        let (current, _) = watch::channel(None);
        Self {
            inner: Arc::new(BrokerInner {
                slot: Mutex::new(None),
                current,
                next_id: AtomicU64::new(1),
            }),
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, Option<Slot>> {
        // A panic while holding the lock cannot leave the slot half-written.
        self.inner
            .slot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Install a new request, cancelling any request still outstanding.
    pub fn request(
        &self,
        question: impl Into<String>,
        fields: Vec<InputField>,
    ) -> PendingHumanInput {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (responder, receiver) = oneshot::channel();
        let prompt = HumanInputPrompt {
            id,
            question: question.into(),
            fields,
        };

        let mut slot = self.lock_slot();
        if let Some(previous) = slot.take() {
            debug!(evicted = previous.prompt.id, replacement = id, "Evicting pending human input request");
            let _ = previous.responder.send(HumanInputOutcome::Cancelled);
        }
        *slot = Some(Slot {
            prompt: prompt.clone(),
            responder,
        });
        self.inner.current.send_replace(Some(prompt));
        drop(slot);

        PendingHumanInput { id, receiver }
    }

    /// Deliver an answer to the outstanding request `id`. The answer is passed
    /// through as-is; field validation is the presenting surface's job.
    pub fn resolve(&self, id: u64, answer: AnswerBag) -> Result<(), HumanInputError> {
        let slot = self.take_if_current(id)?;
        let _ = slot.responder.send(HumanInputOutcome::Answered(answer));
        Ok(())
    }

    /// Cancel the outstanding request `id`.
    pub fn cancel(&self, id: u64) -> Result<(), HumanInputError> {
        let slot = self.take_if_current(id)?;
        let _ = slot.responder.send(HumanInputOutcome::Cancelled);
        Ok(())
    }

    fn take_if_current(&self, id: u64) -> Result<Slot, HumanInputError> {
        let mut slot = self.lock_slot();
        match slot.as_ref() {
            Some(current) if current.prompt.id == id => {}
            _ => return Err(HumanInputError::NotPending(id)),
        }
        let taken = slot.take().ok_or(HumanInputError::NotPending(id))?;
        self.inner.current.send_replace(None);
        Ok(taken)
    }

    /// The outstanding request, if any.
    pub fn current(&self) -> Option<HumanInputPrompt> {
        self.inner.current.borrow().clone()
    }

    /// Subscribe to the outstanding request. The receiver starts out holding
    /// the current state, so late subscribers see a request already pending.
    pub fn subscribe(&self) -> watch::Receiver<Option<HumanInputPrompt>> {
        self.inner.current.subscribe()
    }
}
