//! Stream aggregator: turns, stream deliveries, and derived views
//!
//! Synchronous and single-owner. The async runtime calls into it for every
//! command and every delivery, so all mutation happens in one place.

use super::session::{AgentTarget, Session, SessionCoordinator};
use crate::a2a::{SendTaskParams, StreamEvent, TransportError};
use crate::conversation::{
    classify, BatchOutcome, ConversationStore, Effect, FormValidationError, FormValues,
    ReferenceIndex,
};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Why a turn was not submitted
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TurnError {
    #[error("Prompt is empty")]
    EmptyPrompt,
    #[error("No agent selected")]
    NoSession,
    #[error("A reply is still streaming (cancel it first)")]
    TurnInProgress,
    #[error("Unknown message: {0}")]
    UnknownMessage(String),
    #[error("Message {0} has no form")]
    NoForm(String),
    #[error(transparent)]
    InvalidForm(#[from] FormValidationError),
}

/// Everything needed to open the subscription for an accepted turn
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub generation: u64,
    pub user_message_id: String,
    /// Agent message the stream feeds
    pub message_id: String,
    pub endpoint: String,
    pub params: SendTaskParams,
}

#[derive(Debug)]
pub struct StreamAggregator {
    coordinator: SessionCoordinator,
    store: ConversationStore,
    index: ReferenceIndex,
    error: Option<String>,
}

impl Default for StreamAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamAggregator {
    pub fn new() -> Self {
        Self {
            coordinator: SessionCoordinator::new(),
            store: ConversationStore::new(),
            index: ReferenceIndex::default(),
            error: None,
        }
    }

    // ------------------------------------------------------------------
    // Session
    // ------------------------------------------------------------------

    /// Switch to `target`: a new session with empty state
    pub fn select_target(&mut self, target: AgentTarget) -> &Session {
        self.reset();
        self.coordinator.start_session(target)
    }

    pub fn end_session(&mut self) {
        self.coordinator.end_session();
        self.reset();
    }

    fn reset(&mut self) {
        self.store.clear();
        self.index = ReferenceIndex::default();
        self.error = None;
    }

    // ------------------------------------------------------------------
    // Turns
    // ------------------------------------------------------------------

    pub fn submit_user_turn(&mut self, prompt: &str) -> Result<TurnRequest, TurnError> {
        if prompt.trim().is_empty() {
            return Err(TurnError::EmptyPrompt);
        }
        self.open_turn(prompt.to_string())
    }

    /// Submit values for the form attached to `message_id`.
    ///
    /// Values are validated against the form before anything is recorded; the
    /// outbound text is the JSON of the merged values.
    pub fn submit_form_turn(
        &mut self,
        message_id: &str,
        values: FormValues,
    ) -> Result<TurnRequest, TurnError> {
        let message = self
            .store
            .message(message_id)
            .ok_or_else(|| TurnError::UnknownMessage(message_id.to_string()))?;
        let form = message
            .form
            .as_ref()
            .ok_or_else(|| TurnError::NoForm(message_id.to_string()))?;

        let merged = form.validate(values)?;
        let text = serde_json::Value::Object(merged).to_string();
        self.open_turn(text)
    }

    fn open_turn(&mut self, text: String) -> Result<TurnRequest, TurnError> {
        let session = self.coordinator.active().ok_or(TurnError::NoSession)?;
        let generation = session.generation;
        let endpoint = session.target.endpoint.clone();
        let params = SendTaskParams::user_text(uuid::Uuid::new_v4().to_string(), &session.session_id, &text);

        self.error = None;
        let user_message_id = self.store.push_user_message(text);
        let message_id = self.store.open_agent_message();

        tracing::info!(
            message_id = %message_id,
            request_id = %params.id,
            generation,
            "Turn submitted"
        );

        Ok(TurnRequest {
            generation,
            user_message_id,
            message_id,
            endpoint,
            params,
        })
    }

    /// Close open subscriptions and end every streaming message.
    ///
    /// Text received so far is kept. Returns the ids of the messages ended.
    pub fn cancel(&mut self) -> Vec<String> {
        let cancelled = self.coordinator.cancel_subscriptions();
        let effects: Vec<Effect> = self
            .store
            .streaming_message_ids()
            .iter()
            .map(|id| Effect::terminate(id))
            .collect();
        let outcome = self.store.apply_batch(effects);

        tracing::info!(
            subscriptions = cancelled,
            messages = outcome.closed.len(),
            "Turn cancelled"
        );
        outcome.closed
    }

    pub fn track_subscription(&mut self, message_id: &str, token: CancellationToken) {
        self.coordinator.register_subscription(message_id, token);
    }

    // ------------------------------------------------------------------
    // Deliveries
    // ------------------------------------------------------------------

    /// Apply one stream event. `None` when the delivery belongs to an old session.
    pub fn handle_event(
        &mut self,
        generation: u64,
        message_id: &str,
        event: &StreamEvent,
    ) -> Option<BatchOutcome> {
        if !self.accepts(generation, message_id) {
            return None;
        }

        let outcome = self.store.apply_batch(classify(message_id, event));
        if outcome.research_changed {
            self.on_research_items_changed();
        }
        Some(outcome)
    }

    /// Record a transport failure. Returns whether the message was closed by it.
    pub fn handle_transport_error(
        &mut self,
        generation: u64,
        message_id: &str,
        error: &TransportError,
    ) -> bool {
        if !self.accepts(generation, message_id) {
            return false;
        }

        self.coordinator.release_subscription(message_id);
        let closed = self
            .store
            .apply_batch(vec![Effect::fail(message_id, error.to_string())])
            .applied
            > 0;
        if closed {
            self.error = Some(format!("Streaming error: {error}"));
        }
        closed
    }

    /// The stream ended. A message still streaming at this point is closed.
    pub fn handle_stream_closed(&mut self, generation: u64, message_id: &str) -> bool {
        if !self.accepts(generation, message_id) {
            return false;
        }

        self.coordinator.release_subscription(message_id);
        let still_streaming = self
            .store
            .message(message_id)
            .is_some_and(|message| message.is_streaming);
        if still_streaming {
            tracing::warn!(
                message_id = %message_id,
                "Stream ended without a terminal signal; closing message"
            );
            self.store.apply_effect(Effect::terminate(message_id));
        }
        still_streaming
    }

    fn accepts(&self, generation: u64, message_id: &str) -> bool {
        let current = self.coordinator.is_current(generation);
        if !current {
            tracing::debug!(
                message_id = %message_id,
                generation,
                "Dropping delivery from a previous session"
            );
        }
        current
    }

    fn on_research_items_changed(&mut self) {
        self.index = ReferenceIndex::build(self.store.research_items());
        tracing::debug!(references = self.index.len(), "Reference index rebuilt");
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn session(&self) -> Option<&Session> {
        self.coordinator.active()
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_streaming(&self) -> bool {
        !self.store.streaming_message_ids().is_empty()
    }
}
