//! Conversation store: messages plus per-message derived traces

use super::effect::Effect;
use super::form::FormSpec;
use super::research::ResearchItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Agent,
}

/// A user prompt or an agent reply
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    /// True while the agent reply is still arriving. Goes false once, never back.
    pub is_streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<FormSpec>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    fn new(role: Role, text: String, is_streaming: bool) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            text,
            is_streaming,
            form: None,
            created_at: Utc::now(),
        }
    }
}

/// Result of applying one event's effects
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub applied: usize,
    /// Effects for unknown or already-closed messages
    pub dropped: usize,
    pub research_changed: bool,
    /// Messages this batch took out of streaming
    pub closed: Vec<String>,
}

/// Owns every message and trace of the active session
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    thinking: HashMap<String, Vec<String>>,
    status: HashMap<String, Vec<String>>,
    research: HashMap<String, Vec<ResearchItem>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user_message(&mut self, text: impl Into<String>) -> String {
        let message = Message::new(Role::User, text.into(), false);
        let id = message.id.clone();
        self.messages.push(message);
        id
    }

    /// Open an empty, streaming agent reply
    pub fn open_agent_message(&mut self) -> String {
        let message = Message::new(Role::Agent, String::new(), true);
        let id = message.id.clone();
        self.thinking.insert(id.clone(), Vec::new());
        self.status.insert(id.clone(), Vec::new());
        self.messages.push(message);
        id
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.thinking.clear();
        self.status.clear();
        self.research.clear();
    }

    /// Apply a single effect. Unknown ids and closed messages are ignored.
    pub fn apply_effect(&mut self, effect: Effect) -> bool {
        self.apply_batch(vec![effect]).applied == 1
    }

    /// Apply the effects of one event in order.
    ///
    /// Whether a message accepts writes is decided once, when the batch first
    /// touches it: a message closed by an earlier event gets nothing, while a
    /// message closed mid-batch still receives the rest of that batch.
    pub fn apply_batch(&mut self, effects: Vec<Effect>) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        let mut open_at_start: HashMap<String, Option<usize>> = HashMap::new();

        for effect in effects {
            let slot = *open_at_start
                .entry(effect.message_id().to_string())
                .or_insert_with_key(|id| {
                    self.position(id)
                        .filter(|&index| self.messages[index].is_streaming)
                });

            let Some(index) = slot else {
                tracing::debug!(
                    message_id = %effect.message_id(),
                    "Dropping effect for unknown or closed message"
                );
                outcome.dropped += 1;
                continue;
            };

            if matches!(effect, Effect::RecordResearch { .. }) {
                outcome.research_changed = true;
            }
            if effect.is_terminal() && self.messages[index].is_streaming {
                outcome.closed.push(self.messages[index].id.clone());
            }
            self.apply_at(index, effect);
            outcome.applied += 1;
        }

        outcome
    }

    fn apply_at(&mut self, index: usize, effect: Effect) {
        match effect {
            Effect::AppendThinking { message_id, text } => {
                self.thinking.entry(message_id).or_default().push(text);
            }
            Effect::AppendStatus { message_id, text } => {
                self.status.entry(message_id).or_default().push(text);
            }
            Effect::RecordResearch { message_id, items } => {
                self.research.entry(message_id).or_default().extend(items);
            }
            Effect::UpdateText { text, append, .. } => {
                let message = &mut self.messages[index];
                if append {
                    message.text.push_str(&text);
                } else {
                    message.text = text;
                }
            }
            Effect::AttachForm { form, .. } => {
                let message = &mut self.messages[index];
                message.form = Some(form);
                message.is_streaming = false;
            }
            Effect::Terminate { .. } => {
                self.messages[index].is_streaming = false;
            }
            Effect::Fail { error, .. } => {
                let message = &mut self.messages[index];
                if message.is_streaming {
                    message.text = format!("Error: {error}");
                    message.is_streaming = false;
                }
            }
        }
    }

    fn position(&self, message_id: &str) -> Option<usize> {
        self.messages.iter().position(|m| m.id == message_id)
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.position(message_id).map(|index| &self.messages[index])
    }

    pub fn thinking(&self, message_id: &str) -> &[String] {
        self.thinking.get(message_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn status(&self, message_id: &str) -> &[String] {
        self.status.get(message_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn research(&self, message_id: &str) -> &[ResearchItem] {
        self.research.get(message_id).map(Vec::as_slice).unwrap_or_default()
    }

    /// All research items, in message order then arrival order
    pub fn research_items(&self) -> impl Iterator<Item = &ResearchItem> {
        self.messages
            .iter()
            .flat_map(|message| self.research(&message.id))
    }

    pub fn streaming_message_ids(&self) -> Vec<String> {
        self.messages
            .iter()
            .filter(|m| m.is_streaming)
            .map(|m| m.id.clone())
            .collect()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.thinking.is_empty()
            && self.status.is_empty()
            && self.research.is_empty()
    }
}
