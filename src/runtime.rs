//! Runtime for a streaming agent conversation
//!
//! One task owns the [`StreamAggregator`]; API handlers talk to it through a
//! [`RuntimeHandle`] and observe it through broadcast [`ConversationUpdate`]s.

mod aggregator;
mod executor;
mod session;

#[cfg(test)]
pub mod testing;

pub use aggregator::{StreamAggregator, TurnError};
pub use executor::ConversationRuntime;
pub use session::{AgentTarget, Session};

use crate::a2a::{StreamEvent, TransportError};
use crate::conversation::{Citation, FormValues, Message, ReferenceIndex, ResearchItem, Role};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

/// A message with its traces, as shown to clients
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    #[serde(flatten)]
    pub message: Message,
    pub thinking: Vec<String>,
    pub status: Vec<String>,
    pub research: Vec<ResearchItem>,
    /// Inline `[^id]` markers of the text, resolved against the reference index
    pub citations: Vec<Citation>,
}

impl MessageView {
    fn build(aggregator: &StreamAggregator, message: &Message) -> Self {
        let store = aggregator.store();
        let citations = match message.role {
            Role::Agent => aggregator.index().resolve_markers(&message.text),
            Role::User => Vec::new(),
        };
        Self {
            message: message.clone(),
            thinking: store.thinking(&message.id).to_vec(),
            status: store.status(&message.id).to_vec(),
            research: store.research(&message.id).to_vec(),
            citations,
        }
    }
}

/// Full state of the conversation at one instant
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSnapshot {
    pub session: Option<Session>,
    pub messages: Vec<MessageView>,
    pub references: ReferenceIndex,
    pub error: Option<String>,
    pub streaming: bool,
}

impl ConversationSnapshot {
    fn capture(aggregator: &StreamAggregator) -> Self {
        Self {
            session: aggregator.session().cloned(),
            messages: aggregator
                .store()
                .messages()
                .iter()
                .map(|message| MessageView::build(aggregator, message))
                .collect(),
            references: aggregator.index().clone(),
            error: aggregator.error().map(ToString::to_string),
            streaming: aggregator.is_streaming(),
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum ConversationUpdate {
    /// Session changed; the whole conversation was replaced
    Reset { snapshot: ConversationSnapshot },
    /// A message was added or changed
    Message { message: MessageView },
    References { references: ReferenceIndex },
    /// A reply stopped streaming
    TurnDone { message_id: String },
    Error { message: String },
}

/// Ids of the two messages an accepted turn created
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnAccepted {
    pub user_message_id: String,
    pub agent_message_id: String,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Turn(#[from] TurnError),
    #[error("Conversation runtime has stopped")]
    Stopped,
}

/// What a subscription task hands back to the runtime
#[derive(Debug)]
pub enum Delivery {
    Event(StreamEvent),
    Error(TransportError),
    Closed,
}

/// Requests processed by the runtime task, in arrival order
#[derive(Debug)]
pub enum Command {
    SelectTarget {
        target: AgentTarget,
        reply: oneshot::Sender<Session>,
    },
    EndSession {
        reply: oneshot::Sender<()>,
    },
    SubmitPrompt {
        prompt: String,
        reply: oneshot::Sender<Result<TurnAccepted, TurnError>>,
    },
    SubmitForm {
        message_id: String,
        values: FormValues,
        reply: oneshot::Sender<Result<TurnAccepted, TurnError>>,
    },
    Cancel {
        reply: oneshot::Sender<Vec<String>>,
    },
    Snapshot {
        reply: oneshot::Sender<ConversationSnapshot>,
    },
    Deliver {
        generation: u64,
        message_id: String,
        delivery: Delivery,
    },
}

/// Handle to interact with a running conversation
#[derive(Clone)]
pub struct RuntimeHandle {
    command_tx: mpsc::Sender<Command>,
    broadcast_tx: broadcast::Sender<ConversationUpdate>,
}

impl RuntimeHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<ConversationUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub async fn select_target(&self, target: AgentTarget) -> Result<Session, RuntimeError> {
        self.request(|reply| Command::SelectTarget { target, reply }).await
    }

    pub async fn end_session(&self) -> Result<(), RuntimeError> {
        self.request(|reply| Command::EndSession { reply }).await
    }

    pub async fn submit_prompt(&self, prompt: String) -> Result<TurnAccepted, RuntimeError> {
        let accepted = self
            .request(|reply| Command::SubmitPrompt { prompt, reply })
            .await??;
        Ok(accepted)
    }

    pub async fn submit_form(
        &self,
        message_id: String,
        values: FormValues,
    ) -> Result<TurnAccepted, RuntimeError> {
        let accepted = self
            .request(|reply| Command::SubmitForm {
                message_id,
                values,
                reply,
            })
            .await??;
        Ok(accepted)
    }

    /// Cancel the in-flight turn. Returns the ids of the messages it ended.
    pub async fn cancel(&self) -> Result<Vec<String>, RuntimeError> {
        self.request(|reply| Command::Cancel { reply }).await
    }

    pub async fn snapshot(&self) -> Result<ConversationSnapshot, RuntimeError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, RuntimeError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command_tx
            .send(command(reply_tx))
            .await
            .map_err(|_| RuntimeError::Stopped)?;
        reply_rx.await.map_err(|_| RuntimeError::Stopped)
    }
}
